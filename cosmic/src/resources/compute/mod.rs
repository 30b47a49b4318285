//! Instances and the resources that hang off them

mod affinity_group;
mod disk;
mod instance;
mod nic;
mod secondary_ipaddress;
mod ssh_keypair;
mod template;

pub use affinity_group::AffinityGroupResource;
pub use disk::DiskResource;
pub use instance::InstanceResource;
pub use nic::NicResource;
pub use secondary_ipaddress::SecondaryIpAddressResource;
pub use ssh_keypair::SshKeyPairResource;
pub use template::TemplateResource;
