//! RON I/O
use crate::{
    partition::{BoxBuilder, SliceBuilder},
    solver::SolverSettings,
    traits::{RONExport, RONImport},
    types::{DomainResult, RealScalar},
};

macro_rules! impl_ron {
    ($($ty:ident),*) => {
        $(
            impl<T: RealScalar> RONExport for $ty<T> {
                fn to_ron_string(&self) -> DomainResult<String> {
                    Ok(ron::to_string(self)?)
                }
            }

            impl<T: RealScalar> RONImport for $ty<T> {
                fn from_ron_string(s: &str) -> DomainResult<Self> {
                    Ok(ron::from_str(s)?)
                }
            }
        )*
    };
}

impl_ron!(SliceBuilder, BoxBuilder, SolverSettings);

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        traits::PartitionBuilder,
        types::{Aabb, Axis, DomainError},
    };

    #[test]
    fn test_ron_export_and_import_slices() {
        let b = SliceBuilder::<f64>::from_cuts(vec![0.0, 0.5, 2.0, 3.0], Axis::Y);
        b.export_as_ron("_test_export_slices.ron").unwrap();

        let b2 = SliceBuilder::<f64>::import_from_ron("_test_export_slices.ron").unwrap();

        assert_eq!(b2.tot_ranks(), 3);
        assert_eq!(b2.axis(), Axis::Y);
        assert_eq!(b2, b);
    }

    #[test]
    fn test_ron_export_and_import_boxes() {
        let b = BoxBuilder::<f64>::uniform([2, 3, 1], Aabb::new([0.0; 3], [1.0, 3.0, 1.0]));
        b.export_as_ron("_test_export_boxes.ron").unwrap();

        let b2 = BoxBuilder::<f64>::import_from_ron("_test_export_boxes.ron").unwrap();

        assert_eq!(b2.counts(), [2, 3, 1]);
        assert_eq!(b2.neighbours(0), b.neighbours(0));
    }

    #[test]
    fn test_settings_from_string() {
        let s = SolverSettings::<f32>::from_ron_string(
            "(max_iterations: 12, omega: 0.8, tolerance: Some(0.001), warm_start: false, \
             communication_period: 3, verbose: true)",
        )
        .unwrap();
        assert_eq!(s.max_iterations, 12);
        assert_eq!(s.communication_period, 3);
        assert_eq!(s.tolerance, Some(0.001));
        assert!(!s.warm_start);

        let s2 = SolverSettings::<f32>::from_ron_string(&s.to_ron_string().unwrap()).unwrap();
        assert_eq!(s2, s);
    }

    #[test]
    fn test_invalid_ron() {
        assert!(matches!(
            SliceBuilder::<f64>::from_ron_string("(cuts: [0.0, 1.0]"),
            Err(DomainError::RonParse(_))
        ));
        assert!(matches!(
            SliceBuilder::<f64>::import_from_ron("_does_not_exist.ron"),
            Err(DomainError::Io(_))
        ));
    }
}
