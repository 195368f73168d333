//! External process invocation.
//!
//! Every tool and collaborator program goes through a [`ProcessInvoker`],
//! which lets tests substitute a scripted implementation.

mod invocation;
mod invoker;

pub use invocation::{ToolInvocation, ToolInvocationResult};
pub use invoker::{ProcessInvoker, SystemInvoker};
