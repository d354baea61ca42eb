use crate::error::Result;
use popmd::core::geometry::domain::Dimension;
use popmd::core::geometry::lattice::{Lattice, LatticeStyle};

const STYLES: [LatticeStyle; 9] = [
    LatticeStyle::Sc,
    LatticeStyle::Bcc,
    LatticeStyle::Fcc,
    LatticeStyle::Hcp,
    LatticeStyle::Diamond,
    LatticeStyle::Sq,
    LatticeStyle::Sq2,
    LatticeStyle::Hex,
    LatticeStyle::Custom,
];

/// One line per style: name, supported dimension and number of basis points per cell.
pub fn describe() -> Vec<String> {
    STYLES
        .iter()
        .map(|&style| {
            let dimension = if style.supports(Dimension::Two) && style.supports(Dimension::Three) {
                "2d/3d"
            } else if style.supports(Dimension::Two) {
                "2d"
            } else {
                "3d"
            };
            let dim = if style.supports(Dimension::Three) {
                Dimension::Three
            } else {
                Dimension::Two
            };
            let basis = match Lattice::builder(style, 1.0).build(dim) {
                Ok(lattice) => lattice.basis_len().to_string(),
                Err(_) => "user".to_string(),
            };
            format!("{:<8} {:<6} basis: {}", style.name(), dimension, basis)
        })
        .collect()
}

pub fn run() -> Result<()> {
    for line in describe() {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_style_with_its_basis_size() {
        let lines = describe();
        assert_eq!(lines.len(), STYLES.len());
        assert!(lines.iter().any(|l| l.starts_with("fcc") && l.contains("3d") && l.ends_with("4")));
        assert!(lines.iter().any(|l| l.starts_with("hex") && l.contains("2d")));
        assert!(lines.iter().any(|l| l.starts_with("custom") && l.ends_with("user")));
    }
}
