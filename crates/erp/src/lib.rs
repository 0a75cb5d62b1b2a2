pub mod accessors;
pub mod client;
pub mod endpoints;
pub mod gateway;
pub mod memory;

pub use accessors::ErpService;
pub use client::{
    ErpCredentials, ErpSession, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport, TransportError,
};
pub use endpoints::Endpoints;
pub use gateway::{ErpError, ErpGateway, DEFAULT_LIST_LIMIT, DEFAULT_TOP_DEBTORS};
pub use memory::InMemoryErpGateway;
