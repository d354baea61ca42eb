//! Scalar expressions evaluated at candidate positions.
//!
//! Variables live in a [`VariableStore`]. A [`PositionExpression`] writes the candidate's
//! coordinates into internal variables of the store, then evaluates an equal-style variable
//! that reads them; a non-zero result accepts the candidate.

use nalgebra::Point3;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ExpressionError {
    #[error("Variable '{0}' does not exist")]
    UnknownVariable(String),

    #[error("Variable '{0}' is not an internal variable")]
    NotInternal(String),

    #[error("Variable '{0}' is not an equal-style variable")]
    NotEqualStyle(String),

    #[error("Expression filter '{0}' binds no coordinate")]
    NoCoordinates(String),
}

/// A named-variable engine.
pub trait VariableStore {
    /// Assigns a value to an internal variable.
    fn set_internal(&mut self, name: &str, value: f64) -> Result<(), ExpressionError>;

    /// Evaluates an equal-style variable.
    fn compute_equal(&mut self, name: &str) -> Result<f64, ExpressionError>;

    fn is_internal(&self, name: &str) -> bool;

    fn is_equal(&self, name: &str) -> bool;
}

/// An acceptance test on candidate positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionExpression {
    /// Equal-style variable to evaluate.
    pub test: String,
    pub x: Option<String>,
    pub y: Option<String>,
    pub z: Option<String>,
}

impl PositionExpression {
    pub fn new(test: &str) -> Self {
        Self {
            test: test.to_string(),
            x: None,
            y: None,
            z: None,
        }
    }

    pub fn bind_x(mut self, name: &str) -> Self {
        self.x = Some(name.to_string());
        self
    }

    pub fn bind_y(mut self, name: &str) -> Self {
        self.y = Some(name.to_string());
        self
    }

    pub fn bind_z(mut self, name: &str) -> Self {
        self.z = Some(name.to_string());
        self
    }

    fn bindings(&self) -> impl Iterator<Item = (usize, &str)> {
        [&self.x, &self.y, &self.z]
            .into_iter()
            .enumerate()
            .filter_map(|(axis, name)| name.as_deref().map(|n| (axis, n)))
    }

    /// Checks that the test variable and every bound coordinate variable exist with the
    /// right style.
    pub fn validate(&self, store: &dyn VariableStore) -> Result<(), ExpressionError> {
        if self.bindings().next().is_none() {
            return Err(ExpressionError::NoCoordinates(self.test.clone()));
        }
        if !store.is_equal(&self.test) {
            return Err(ExpressionError::NotEqualStyle(self.test.clone()));
        }
        for (_, name) in self.bindings() {
            if !store.is_internal(name) {
                return Err(ExpressionError::NotInternal(name.to_string()));
            }
        }
        Ok(())
    }

    /// Binds `position` and evaluates the test; non-zero accepts.
    pub fn passes(
        &self,
        store: &mut dyn VariableStore,
        position: &Point3<f64>,
    ) -> Result<bool, ExpressionError> {
        for (axis, name) in self.bindings() {
            store.set_internal(name, position[axis])?;
        }
        Ok(store.compute_equal(&self.test)? != 0.0)
    }
}

type Formula = Box<dyn Fn(&HashMap<String, f64>) -> f64 + Send + Sync>;

/// A [`VariableStore`] whose equal-style variables are Rust closures over the internal
/// variables.
#[derive(Default)]
pub struct ExpressionTable {
    internals: HashMap<String, f64>,
    formulas: HashMap<String, Formula>,
}

impl ExpressionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_internal(mut self, name: &str, value: f64) -> Self {
        self.internals.insert(name.to_string(), value);
        self
    }

    pub fn with_equal<F>(mut self, name: &str, formula: F) -> Self
    where
        F: Fn(&HashMap<String, f64>) -> f64 + Send + Sync + 'static,
    {
        self.formulas.insert(name.to_string(), Box::new(formula));
        self
    }

    pub fn internal(&self, name: &str) -> Option<f64> {
        self.internals.get(name).copied()
    }
}

impl fmt::Debug for ExpressionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionTable")
            .field("internals", &self.internals)
            .field("formulas", &self.formulas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl VariableStore for ExpressionTable {
    fn set_internal(&mut self, name: &str, value: f64) -> Result<(), ExpressionError> {
        match self.internals.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ExpressionError::UnknownVariable(name.to_string())),
        }
    }

    fn compute_equal(&mut self, name: &str) -> Result<f64, ExpressionError> {
        self.formulas
            .get(name)
            .map(|formula| formula(&self.internals))
            .ok_or_else(|| ExpressionError::UnknownVariable(name.to_string()))
    }

    fn is_internal(&self, name: &str) -> bool {
        self.internals.contains_key(name)
    }

    fn is_equal(&self, name: &str) -> bool {
        self.formulas.contains_key(name)
    }
}
