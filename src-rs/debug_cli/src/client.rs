use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{DownloadRequest, JobInfo, UpdateCheck, UpdateStatus};

pub struct HTTPClient {
    pub base_url: String,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn submit_download(&self, req: &DownloadRequest) -> Result<String, String> {
        let resp = self
            .client
            .post(self.url("/server-download"))
            .json(req)
            .send()
            .map_err(|err| err.to_string())?;
        let body: Value = decode(resp)?;
        id_field(&body, "downloadId")
    }

    pub fn submit_update(&self) -> Result<String, String> {
        let resp = self
            .client
            .post(self.url("/system/update/install"))
            .send()
            .map_err(|err| err.to_string())?;
        let body: Value = decode(resp)?;
        id_field(&body, "updateId")
    }

    /// Looks the id up as a download first, then as an update.
    pub fn status(&self, id: &str) -> Result<JobInfo, String> {
        let resp = self
            .client
            .get(self.url(&format!("/server-download/{}", id)))
            .send()
            .map_err(|err| err.to_string())?;
        if resp.status().as_u16() != 404 {
            return decode(resp);
        }
        let resp = self
            .client
            .get(self.url("/system/update/progress"))
            .query(&[("id", id)])
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn list_jobs(&self, limit: usize) -> Result<Vec<JobInfo>, String> {
        let resp = self
            .client
            .get(self.url(&format!("/jobs?limit={}", limit)))
            .send()
            .map_err(|err| err.to_string())?;
        let value: Value = decode(resp)?;
        let jobs = value
            .get("jobs")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let mut out = Vec::new();
        for item in jobs {
            if let Ok(job) = serde_json::from_value::<JobInfo>(item) {
                out.push(job);
            }
        }
        Ok(out)
    }

    pub fn cancel(&self, id: &str) -> Result<JobInfo, String> {
        let resp = self
            .client
            .delete(self.url(&format!("/jobs/{}", id)))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn check(&self) -> Result<UpdateCheck, String> {
        let resp = self
            .client
            .post(self.url("/system/update/check"))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }

    pub fn update_status(&self) -> Result<UpdateStatus, String> {
        let resp = self
            .client
            .get(self.url("/system/update/status"))
            .send()
            .map_err(|err| err.to_string())?;
        decode(resp)
    }
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    if resp.status().is_success() {
        resp.json::<T>().map_err(|err| err.to_string())
    } else {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(format!("http {}: {}", status.as_u16(), message))
    }
}

fn id_field(body: &Value, key: &str) -> Result<String, String> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| format!("response missing {}", key))
}
