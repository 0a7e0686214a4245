pub mod codes;
pub mod issuance;
pub mod organizers;
pub mod payments;
pub mod scan;
pub mod stats;
