pub mod form;
pub mod request;
pub mod response;

pub use request::{ HttpRequest, ParseError };
pub use response::HttpResponse;
