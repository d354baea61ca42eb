use super::error::PopulateError;
use crate::core::expression::{PositionExpression, VariableStore};
use crate::core::geometry::region::Region;
use nalgebra::Point3;

/// Region and expression tests applied to every candidate position before ownership.
pub struct CandidateFilter<'a> {
    region: Option<&'a dyn Region>,
    expression: Option<(&'a PositionExpression, &'a mut dyn VariableStore)>,
}

impl<'a> CandidateFilter<'a> {
    /// A filter that accepts everything.
    pub fn pass_all() -> Self {
        Self {
            region: None,
            expression: None,
        }
    }

    pub fn new(
        region: Option<&'a dyn Region>,
        expression: Option<&'a PositionExpression>,
        variables: Option<&'a mut dyn VariableStore>,
    ) -> Result<Self, PopulateError> {
        let expression = match (expression, variables) {
            (None, _) => None,
            (Some(_), None) => return Err(PopulateError::MissingVariableStore),
            (Some(expr), Some(vars)) => {
                expr.validate(&*vars)?;
                Some((expr, vars))
            }
        };
        Ok(Self { region, expression })
    }

    pub fn region(&self) -> Option<&'a dyn Region> {
        self.region
    }

    pub fn accepts(&mut self, x: &Point3<f64>) -> Result<bool, PopulateError> {
        if let Some(region) = self.region {
            if !region.contains(x) {
                return Ok(false);
            }
        }
        if let Some((expr, vars)) = &mut self.expression {
            return Ok(expr.passes(&mut **vars, x)?);
        }
        Ok(true)
    }
}
