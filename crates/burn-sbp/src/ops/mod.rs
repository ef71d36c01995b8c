//! Built-in operators.

mod add;
mod mini_reader;
mod reduce_sum;

pub use add::*;
pub use mini_reader::*;
pub use reduce_sum::*;

use crate::{OpError, OpRegistry};

/// Registers every built-in operator.
pub fn register_builtin(registry: &mut OpRegistry) -> Result<(), OpError> {
    registry.register(mini_reader()?)?;
    registry.register(add()?)?;
    registry.register(reduce_sum()?)?;
    Ok(())
}
