mod models;
mod printer;
mod runner;
mod transport;

pub use models::{ExecutionOptions, InboundResponse, OutboundRequest, ResolvedRequest};
#[cfg(feature = "cli")]
pub use printer::print_call_result;
pub use printer::render_report;
pub use runner::{
    build_outbound, execute, execute_request, resolve_request, validate_url, REQUEST_TIMEOUT,
};
pub use transport::{
    is_local_target, ReqwestTransport, Transport, TransportKind, TransportPolicy,
    TransportSelector,
};
