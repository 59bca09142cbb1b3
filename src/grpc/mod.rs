//! gRPC surface: the authentication gate and the account service.
//!
//! ```text
//! request -> AuthLayer (AuthGate) -> AccountServer -> AccountService
//! ```

mod context;
mod gate;
mod layer;
pub mod messages;
mod server;
mod stream;

pub use context::{CallContext, ResolvedIdentity};
pub use gate::{
    Admission, AuthGate, ExemptionError, ExemptionSet, BEARER_PREFIX, DEFAULT_EXEMPT_METHODS,
};
pub use layer::{AuthLayer, AuthService};
pub use server::{AccountServer, SERVICE_NAME};
pub use stream::AuthenticatedStream;
