pub mod interpreter;
pub mod invoker;
pub mod lookup;

pub use interpreter::Interpreter;
pub use invoker::{
    run_with_timeout, spawn, ExitReason, ProcessEvent, ProcessInvoker, ProcessOutcome,
    ProcessSpec, RunningProcess,
};
pub use lookup::VendorLookup;
