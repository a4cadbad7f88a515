mod acl;
mod gateway_auth;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use gateway_auth::{GatewayAuthFactory, GatewayAuthService};
