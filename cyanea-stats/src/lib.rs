//! Statistical methods for the Cyanea bioinformatics ecosystem.
//!
//! - **Correlation**: Pearson coefficients over vectors with missing values,
//!   with t-test p-values ([`correlation`])
//! - **Multiple testing correction**: Benjamini-Hochberg over a full scan
//!   ([`correction`])
//! - **Distributions**: Student's t and the incomplete beta function
//!   ([`distribution`])

pub mod correction;
pub mod correlation;
pub mod distribution;

pub use correction::{apply_fdr, benjamini_hochberg, benjamini_hochberg_partial, FdrRecord};
pub use correlation::{
    paired_pearson, paired_pearson_opt, pearson, pearson_p_value, CorrelationRecord,
    IndexedCorrelation, PairedCorrelation,
};
pub use distribution::{betai, ln_gamma, Distribution, StudentT};
