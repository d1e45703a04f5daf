//! `SourceClient`: the narrow interface consumed from the (out-of-scope)
//! package source protocol clients (V2/V3) collaborator (spec §6).

use nuget_schemas::DependencyGroup;

/// One source's view of a package's metadata, as returned by
/// `get_metadata`. Contains every dependency group the nuspec exposes;
/// group selection is the walker's job (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub dependency_groups: Vec<DependencyGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V2,
    V3,
}

/// A downloaded package's raw archive bytes, handed to the protocol-
/// appropriate extractor.
pub struct PackageBytes(pub Vec<u8>);

pub trait SourceClient: Send + Sync {
    /// Host this client talks to, used to key the per-host circuit
    /// breaker (spec §4.5).
    fn host(&self) -> &str;

    /// Source identifier (URL or local directory), used to key the
    /// per-source rate limiter (spec §4.4).
    fn source(&self) -> &str;

    fn protocol_version(&self) -> ProtocolVersion;

    fn list_versions(&self, id: &str) -> Result<Vec<String>, nuget_util::RestoreError>;

    fn get_metadata(
        &self,
        id: &str,
        version: &str,
    ) -> Result<PackageMetadata, nuget_util::RestoreError>;

    fn download_package(
        &self,
        id: &str,
        version: &str,
    ) -> Result<PackageBytes, nuget_util::RestoreError>;
}
