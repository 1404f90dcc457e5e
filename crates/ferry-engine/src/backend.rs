//! Backend descriptors: endpoint layout and wire path form per backend family.

use std::fmt::Debug;

use ferry_core::{DevicePath, RemotePath, ServicePath, TaskRef};

/// Endpoint layout and path conventions of one backend family.
pub trait Backend: Clone + Debug + Send + Sync + 'static {
    /// Path variant addressed by the backend.
    type Path: RemotePath;

    /// Short backend identifier used in logs.
    fn name(&self) -> &'static str;

    /// Endpoint accepting batch submissions.
    fn batch_endpoint(&self) -> String;

    /// Endpoint describing one background task.
    fn task_endpoint(&self, task: &TaskRef) -> String;

    /// Endpoint returning resource metadata.
    fn resource_endpoint(&self) -> String;

    /// Endpoint opening file content.
    fn content_endpoint(&self) -> String;

    /// Endpoint accepting uploads.
    fn upload_endpoint(&self) -> String;

    /// Path as it appears in request bodies and query parameters.
    fn wire_path(&self, path: &Self::Path) -> String;
}

const SERVICE_API: &str = "/api/v1";
const DEVICE_API: &str = "/api/device";

/// Multi-tenant service: namespaced `/webdav` paths sent percent-encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceBackend;

impl Backend for ServiceBackend {
    type Path = ServicePath;

    fn name(&self) -> &'static str {
        "service"
    }

    fn batch_endpoint(&self) -> String {
        format!("{SERVICE_API}/files/batch")
    }

    fn task_endpoint(&self, task: &TaskRef) -> String {
        format!("{SERVICE_API}/tasks/{}", urlencoding::encode(task.as_str()))
    }

    fn resource_endpoint(&self) -> String {
        format!("{SERVICE_API}/files/resource")
    }

    fn content_endpoint(&self) -> String {
        format!("{SERVICE_API}/files/content")
    }

    fn upload_endpoint(&self) -> String {
        format!("{SERVICE_API}/files/upload")
    }

    fn wire_path(&self, path: &ServicePath) -> String {
        path.encoded()
    }
}

/// Single embedded device: plain paths below `/share`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceBackend;

impl Backend for DeviceBackend {
    type Path = DevicePath;

    fn name(&self) -> &'static str {
        "device"
    }

    fn batch_endpoint(&self) -> String {
        format!("{DEVICE_API}/batch")
    }

    fn task_endpoint(&self, task: &TaskRef) -> String {
        format!("{DEVICE_API}/tasks/{}", urlencoding::encode(task.as_str()))
    }

    fn resource_endpoint(&self) -> String {
        format!("{DEVICE_API}/resource")
    }

    fn content_endpoint(&self) -> String {
        format!("{DEVICE_API}/content")
    }

    fn upload_endpoint(&self) -> String {
        format!("{DEVICE_API}/upload")
    }

    fn wire_path(&self, path: &DevicePath) -> String {
        path.absolute()
    }
}
