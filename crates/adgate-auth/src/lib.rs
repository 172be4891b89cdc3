//! Authentication for Adgate
//!
//! Directory (LDAP/Active Directory) access and the orchestrator that routes
//! each login to local credential verification or to the directory.

pub mod backend;
pub mod ldap;

pub use backend::{
    AuthOutcome, AuthenticationOrchestrator, EmailPopulator, ErrorHook, PopulateHook,
};
pub use ldap::{
    AccountControlFlags, DirectoryConnection, DirectoryEntry, DirectoryServerPool,
    DirectoryTransport, DirectoryUser, Ldap3Transport, PasswordChange, ServerEndpoint,
};
