//! `reqwest`-based implementation of `RemoteApi` against the central
//! server's REST surface.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::{ChangeBatch, RemoteApi, RemoteFileInfo, RemoteFileSummary};
use crate::error::SyncError;

pub struct HttpRemoteApi {
	client: Client,
	base_url: String,
	auth_token: String,
}

impl HttpRemoteApi {
	pub fn new(
		base_url: String,
		auth_token: String,
		connect_timeout: Duration,
		read_timeout: Duration,
	) -> Result<Self, SyncError> {
		let client = Client::builder()
			.connect_timeout(connect_timeout)
			.timeout(read_timeout)
			.build()
			.map_err(|e| SyncError::Configuration { message: format!("failed to build HTTP client: {}", e) })?;

		Ok(HttpRemoteApi { client, base_url, auth_token })
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url.trim_end_matches('/'), path)
	}

	fn map_transport_error(e: reqwest::Error) -> SyncError {
		SyncError::NetworkTransient {
			message: if e.is_timeout() || e.is_connect() {
				"network is unreachable".to_string()
			} else {
				e.to_string()
			},
			source: Some(crate::error::boxed_error(e)),
		}
	}
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
	async fn get_file_info(&self, path: &str) -> Result<Option<RemoteFileInfo>, SyncError> {
		let resp = self
			.client
			.get(self.url(&format!("/api/files/{}", urlencoding_path(path))))
			.bearer_auth(&self.auth_token)
			.send()
			.await
			.map_err(Self::map_transport_error)?;

		match resp.status() {
			StatusCode::NOT_FOUND => Ok(None),
			StatusCode::UNAUTHORIZED => {
				Err(SyncError::Authentication { message: "server rejected the auth token".to_string() })
			}
			status if status.is_success() => {
				let info: RemoteFileInfo =
					resp.json().await.map_err(Self::map_transport_error)?;
				Ok(Some(info))
			}
			status => Err(SyncError::NetworkTransient {
				message: format!("unexpected status {} from server", status),
				source: None,
			}),
		}
	}

	async fn upload_chunk(&self, hash: &str, nonce: &[u8], ciphertext: &[u8]) -> Result<(), SyncError> {
		let mut body = Vec::with_capacity(nonce.len() + ciphertext.len());
		body.extend_from_slice(nonce);
		body.extend_from_slice(ciphertext);

		let resp = self
			.client
			.put(self.url(&format!("/api/chunks/{}", hash)))
			.bearer_auth(&self.auth_token)
			.body(body)
			.send()
			.await
			.map_err(Self::map_transport_error)?;

		if resp.status().is_success() {
			Ok(())
		} else {
			Err(SyncError::NetworkTransient {
				message: format!("chunk upload failed with status {}", resp.status()),
				source: None,
			})
		}
	}

	async fn download_chunk(&self, hash: &str) -> Result<(Vec<u8>, Vec<u8>), SyncError> {
		let resp = self
			.client
			.get(self.url(&format!("/api/chunks/{}", hash)))
			.bearer_auth(&self.auth_token)
			.send()
			.await
			.map_err(Self::map_transport_error)?;

		if !resp.status().is_success() {
			return Err(SyncError::NetworkTransient {
				message: format!("chunk download failed with status {}", resp.status()),
				source: None,
			});
		}

		let body = resp.bytes().await.map_err(Self::map_transport_error)?;
		if body.len() < 12 {
			return Err(SyncError::Integrity {
				path: hash.to_string(),
				expected: "nonce + ciphertext".to_string(),
				actual: format!("{} bytes", body.len()),
			});
		}
		let (nonce, ciphertext) = body.split_at(12);
		Ok((nonce.to_vec(), ciphertext.to_vec()))
	}

	async fn commit_file(
		&self,
		path: &str,
		chunk_hashes: &[String],
		size: u64,
		base_version: Option<u64>,
	) -> Result<u64, SyncError> {
		#[derive(serde::Serialize)]
		struct CommitRequest<'a> {
			chunk_hashes: &'a [String],
			size: u64,
			base_version: Option<u64>,
		}
		#[derive(serde::Deserialize)]
		struct CommitResponse {
			version: u64,
		}
		#[derive(serde::Deserialize)]
		struct ConflictResponse {
			current_version: u64,
		}

		let resp = self
			.client
			.post(self.url(&format!("/api/files/{}/commit", urlencoding_path(path))))
			.bearer_auth(&self.auth_token)
			.json(&CommitRequest { chunk_hashes, size, base_version })
			.send()
			.await
			.map_err(Self::map_transport_error)?;

		match resp.status() {
			StatusCode::CONFLICT => {
				let conflict: ConflictResponse =
					resp.json().await.map_err(Self::map_transport_error)?;
				Err(SyncError::VersionConflict {
					path: path.to_string(),
					current_version: conflict.current_version,
				})
			}
			status if status.is_success() => {
				let committed: CommitResponse =
					resp.json().await.map_err(Self::map_transport_error)?;
				Ok(committed.version)
			}
			status => Err(SyncError::NetworkTransient {
				message: format!("commit failed with status {}", status),
				source: None,
			}),
		}
	}

	async fn delete_file(&self, path: &str, base_version: u64) -> Result<(), SyncError> {
		let resp = self
			.client
			.delete(self.url(&format!(
				"/api/files/{}?base_version={}",
				urlencoding_path(path),
				base_version
			)))
			.bearer_auth(&self.auth_token)
			.send()
			.await
			.map_err(Self::map_transport_error)?;

		if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
			Ok(())
		} else if resp.status() == StatusCode::CONFLICT {
			Err(SyncError::VersionConflict { path: path.to_string(), current_version: base_version })
		} else {
			Err(SyncError::NetworkTransient {
				message: format!("delete failed with status {}", resp.status()),
				source: None,
			})
		}
	}

	async fn poll_changes(&self, cursor: Option<u64>) -> Result<ChangeBatch, SyncError> {
		let mut req = self.client.get(self.url("/api/changes")).bearer_auth(&self.auth_token);
		if let Some(cursor) = cursor {
			req = req.query(&[("cursor", cursor)]);
		}

		let resp = req.send().await.map_err(Self::map_transport_error)?;
		if !resp.status().is_success() {
			return Err(SyncError::NetworkTransient {
				message: format!("poll_changes failed with status {}", resp.status()),
				source: None,
			});
		}
		resp.json().await.map_err(Self::map_transport_error)
	}

	async fn has_chunk(&self, hash: &str) -> Result<bool, SyncError> {
		let resp = self
			.client
			.head(self.url(&format!("/api/chunks/{}", hash)))
			.bearer_auth(&self.auth_token)
			.send()
			.await
			.map_err(Self::map_transport_error)?;

		match resp.status() {
			StatusCode::NOT_FOUND => Ok(false),
			status if status.is_success() => Ok(true),
			status => Err(SyncError::NetworkTransient {
				message: format!("chunk presence check failed with status {}", status),
				source: None,
			}),
		}
	}

	async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<RemoteFileSummary>, SyncError> {
		let mut req = self.client.get(self.url("/api/files")).bearer_auth(&self.auth_token);
		if let Some(prefix) = prefix {
			req = req.query(&[("prefix", prefix)]);
		}

		let resp = req.send().await.map_err(Self::map_transport_error)?;
		if !resp.status().is_success() {
			return Err(SyncError::NetworkTransient {
				message: format!("list_files failed with status {}", resp.status()),
				source: None,
			});
		}
		resp.json().await.map_err(Self::map_transport_error)
	}
}

fn urlencoding_path(path: &str) -> String {
	path.split('/').map(|segment| urlencoding_segment(segment)).collect::<Vec<_>>().join("/")
}

fn urlencoding_segment(segment: &str) -> String {
	segment
		.bytes()
		.map(|b| match b {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
				(b as char).to_string()
			}
			_ => format!("%{:02X}", b),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn path_segments_are_percent_encoded() {
		assert_eq!(urlencoding_path("dir/a file.txt"), "dir/a%20file.txt");
		assert_eq!(urlencoding_path("plain.txt"), "plain.txt");
	}
}

// vim: ts=4
