use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ferry_core::wire::{
    OpenBody, RC_NAME_REJECTED, RC_OK, RC_QUOTA_EXCEEDED, ResourceBody, ResultCodeBody, UploadBody,
};
use ferry_core::{
    FileHandle, Method, PathError, RemoteError, RemotePath, RemoteResult, Request, ResourceInfo,
    ResourceKind, Response, TransportError,
};
use tracing::info;

use super::{Command, decode_body, encode_body, execute, translate_transport_error};
use crate::backend::Backend;
use crate::session::Session;

fn parse_href<P: RemotePath>(operation: &'static str, href: &str) -> RemoteResult<P> {
    P::from_href(href).map_err(|err| RemoteError::UnexpectedResponse {
        operation,
        detail: format!("unrecognised href '{href}': {err}"),
    })
}

/// Reject names that would not form exactly one path segment.
pub(crate) fn validate_name(name: &str) -> RemoteResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative marker")
    } else if name.contains('/') {
        Some("name contains a separator")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(PathError::InvalidSegment {
            segment: name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}

/// Fetch metadata for one resource.
#[derive(Debug, Clone)]
pub struct GetMetadata<B: Backend> {
    backend: B,
    path: B::Path,
}

impl<B: Backend> GetMetadata<B> {
    /// Describe `path`.
    pub const fn new(backend: B, path: B::Path) -> Self {
        Self { backend, path }
    }
}

#[async_trait]
impl<B: Backend> Command for GetMetadata<B> {
    type Output = ResourceInfo<B::Path>;

    fn name(&self) -> &'static str {
        "get_metadata"
    }

    fn request(&self) -> RemoteResult<Request> {
        Ok(Request::get(self.backend.resource_endpoint())
            .with_query("path", self.backend.wire_path(&self.path)))
    }

    fn interpret(&self, response: Response) -> RemoteResult<Self::Output> {
        let body: ResourceBody = decode_body(self.name(), &response)?;
        Ok(ResourceInfo {
            path: parse_href(self.name(), &body.href)?,
            kind: body.kind,
            size: body.size,
            writable: body.writable,
        })
    }

    fn translate(&self, error: TransportError) -> RemoteError {
        translate_transport_error(self.name(), error, &self.path.absolute())
    }
}

/// Open a file for reading.
#[derive(Debug, Clone)]
pub struct OpenFile<B: Backend> {
    backend: B,
    path: B::Path,
}

impl<B: Backend> OpenFile<B> {
    /// Open `path`.
    pub const fn new(backend: B, path: B::Path) -> Self {
        Self { backend, path }
    }
}

#[async_trait]
impl<B: Backend> Command for OpenFile<B> {
    type Output = FileHandle<B::Path>;

    fn name(&self) -> &'static str {
        "open_file"
    }

    fn request(&self) -> RemoteResult<Request> {
        Ok(Request::get(self.backend.content_endpoint())
            .with_query("path", self.backend.wire_path(&self.path)))
    }

    fn interpret(&self, response: Response) -> RemoteResult<Self::Output> {
        let body: OpenBody = decode_body(self.name(), &response)?;
        Ok(FileHandle {
            path: parse_href(self.name(), &body.href)?,
            size: body.size,
            handle: body.handle,
        })
    }

    fn translate(&self, error: TransportError) -> RemoteError {
        let path = self.path.absolute();
        RemoteError::Open {
            cause: Box::new(translate_transport_error(self.name(), error, &path)),
            path,
        }
    }
}

/// Store a new file in a folder.
#[derive(Debug, Clone)]
pub struct Upload<B: Backend> {
    backend: B,
    folder: B::Path,
    name: String,
    content: Vec<u8>,
}

impl<B: Backend> Upload<B> {
    /// Upload `content` as `folder/name`.
    pub fn new(backend: B, folder: B::Path, name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            backend,
            folder,
            name: name.into(),
            content,
        }
    }
}

#[async_trait]
impl<B: Backend> Command for Upload<B> {
    type Output = B::Path;

    fn name(&self) -> &'static str {
        "upload"
    }

    fn validate(&self) -> RemoteResult<()> {
        validate_name(&self.name)
    }

    async fn before(&self, session: &Session) -> RemoteResult<()> {
        let folder = self.folder.absolute();
        let info = match execute(
            GetMetadata::new(self.backend.clone(), self.folder.clone()),
            session,
        )
        .await
        {
            Ok(info) => info,
            Err(RemoteError::ObjectNotFound { path }) => {
                return Err(RemoteError::DestinationNotFound { path });
            }
            Err(err) => return Err(err),
        };
        if info.kind != ResourceKind::Folder {
            return Err(RemoteError::NotAFolder { path: folder });
        }
        if !info.writable {
            return Err(RemoteError::ReadOnlyDestination { path: folder });
        }
        Ok(())
    }

    fn request(&self) -> RemoteResult<Request> {
        let body = UploadBody {
            folder: self.backend.wire_path(&self.folder),
            name: self.name.clone(),
            content: STANDARD.encode(&self.content),
        };
        Ok(Request {
            method: Method::Put,
            path: self.backend.upload_endpoint(),
            query: Vec::new(),
            body: Some(encode_body(self.name(), &body)?),
        })
    }

    fn interpret(&self, response: Response) -> RemoteResult<Self::Output> {
        let body: ResultCodeBody = decode_body(self.name(), &response)?;
        match body.rc.as_str() {
            RC_OK => Ok(self.folder.join(&self.name)?),
            RC_QUOTA_EXCEEDED => Err(RemoteError::QuotaExceeded {
                path: self.folder.absolute(),
                message: body.message,
            }),
            RC_NAME_REJECTED => Err(RemoteError::NameRejected {
                name: self.name.clone(),
                message: body.message,
            }),
            _ => Err(RemoteError::Application {
                operation: self.name(),
                status: response.status,
                code: Some(body.rc),
                message: body.message,
            }),
        }
    }

    fn translate(&self, error: TransportError) -> RemoteError {
        translate_transport_error(self.name(), error, &self.folder.absolute())
    }

    fn after(&self, output: &Self::Output) {
        info!(path = %output.absolute(), bytes = self.content.len(), "upload stored");
    }
}
