pub mod multipart;
pub mod request;
pub mod response;
pub mod transport;

pub use multipart::MultipartPart;
pub use request::{PreparedRequest, Request, RequestBuilder, RequestFormat, ResponseFormat};
pub use response::{RawResponse, Response};
pub use transport::{ReqwestTransport, Transport};
