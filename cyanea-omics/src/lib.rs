//! Omics data structures for the Cyanea bioinformatics ecosystem.
//!
//! - **Measurement matrices**: [`MeasurementMatrix`] (genes × samples) with
//!   an explicit missing marker per cell
//! - **Loader interface**: [`MeasurementSource`]
//!
//! # Quick start
//!
//! ```
//! use cyanea_omics::MeasurementMatrix;
//! use cyanea_core::Summarizable;
//!
//! let matrix = MeasurementMatrix::new(
//!     vec![vec![Some(1.0), None], vec![Some(3.0), Some(4.0)]],
//!     vec!["TP53".into(), "MDM2".into()],
//!     vec!["ACH-000001".into(), "ACH-000002".into()],
//! ).unwrap();
//!
//! assert_eq!(matrix.shape(), (2, 2));
//! assert_eq!(matrix.get(0, 1), None);
//! assert_eq!(matrix.summary(), "MeasurementMatrix: 2 genes \u{00d7} 2 samples (1 missing)");
//! ```

pub mod measurement;

pub use measurement::{MeasurementMatrix, MeasurementRow, MeasurementSource};
