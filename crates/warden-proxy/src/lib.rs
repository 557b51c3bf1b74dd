//! Warden Security Proxies
//!
//! This crate provides security proxies for dynamic values:
//! - **Catalog**: the closed set of interceptable operations and their
//!   handling strategy (`catalog` module)
//! - **Proxy**: checked reads, unchecked writes, mediated results
//!   (`proxy` module)
//! - **Backends**: a portable and an accelerated implementation with
//!   identical behavior (`backend` module)
//! - **Policy**: a permission-table checker, a type registry and TOML
//!   configuration (`policy`, `registry`, `config` modules)
//! - **Escape API**: trusted construction and unwrapping (`make`, `unwrap`,
//!   `get_checker`, `get_permissions`)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_proxy::{make, unwrap, Grants, List, PolicyChecker};
//!
//! let grants = Arc::new(Grants::new());
//! let checker = PolicyChecker::new(grants.clone())
//!     .public("len")
//!     .protect("item-get", "zope.View")
//!     .into_ref();
//!
//! let items = List::of([1, 2, 3]).into_value();
//! let proxy = make(items.clone(), checker)?;
//! let handle = proxy.as_proxy().unwrap();
//!
//! assert_eq!(handle.len()?, 3);
//! assert!(handle.get_item(0).is_err());
//!
//! grants.grant("zope.View");
//! assert_eq!(handle.get_item(0)?, 1.into());
//! assert!(unwrap(&proxy).is_same(&items));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod backend;
pub mod builtins;
pub mod catalog;
pub mod checker;
pub mod config;
pub mod error;
pub mod escape;
pub mod host;
pub mod object;
pub mod policy;
pub mod proxy;
pub mod registry;
pub mod value;

pub use backend::{Backend, BackendKind, BackendPreference};
pub use builtins::{Dict, List, ListIterator, NativeFunction, Record};
pub use catalog::{Catalog, Operation, Strategy};
pub use checker::{Checker, CheckerRef, Mediator, Permission};
pub use config::{Config, ConfigError};
pub use error::{ProxyError, ProxyResult};
pub use escape::{get_checker, get_permissions, is_instance_of, is_instance_of_type, make, unwrap, Guard};
pub use object::{Object, ObjectRef, TypeName};
pub use policy::{Grants, PolicyChecker};
pub use proxy::{redacted_repr, Proxy, ProxyIter};
pub use registry::{CheckerRegistry, CheckerSource};
pub use value::Value;
