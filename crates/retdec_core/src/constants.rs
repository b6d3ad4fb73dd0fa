use std::time::Duration;

/// The public retdec service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://retdec.com/service/api";

/// Time between two status requests of the same job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

pub mod routes {
    pub const DECOMPILATIONS: &str = "decompiler/decompilations";
    pub const DECOMPILATION_STATUS: &str = "decompiler/decompilations/{id}/status";
    pub const DECOMPILATION_OUTPUTS: &str = "decompiler/decompilations/{id}/outputs";
    pub const DECOMPILATION_BY_ID: &str = "decompiler/decompilations/{id}";

    pub const TEST_ECHO: &str = "test/echo";
}

pub mod links {
    pub const DECOMPILATION: &str = "decompilation";
    pub const STATUS: &str = "status";
    pub const OUTPUTS: &str = "outputs";
}
