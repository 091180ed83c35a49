//! Data models for Atelier Loans

pub mod device;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use device::{Device, DeviceGroup};
pub use loan::{Loan, LoanStatus, SweepReport};
pub use user::{Role, UserClaims};
