pub mod address;
pub mod deployer;

pub use address::AddressDeriver;
pub use deployer::Deployer;
