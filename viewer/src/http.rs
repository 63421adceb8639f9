use {
    bodyrig::session::{
        ImageUpload, MeasurementRequest, MeasurementResponse, SessionError,
        SessionId, StatusResponse, SubmitResponse, Transport,
    },
    color_eyre::Report,
    eyre::WrapErr,
    futures::future::{BoxFuture, FutureExt as _},
    reqwest::{multipart, Client, Response, StatusCode},
    std::time::Duration,
    url::Url,
};

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Talks to the reconstruction server over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Report> {
        let base = Url::parse(base_url)
            .wrap_err_with(|| format!("Invalid API base URL '{}'", base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(HttpTransport { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        self.base.join(path).map_err(|err| {
            SessionError::transport(format!("Invalid endpoint '{}': {}", path, err))
        })
    }
}

fn network(err: reqwest::Error) -> SessionError {
    SessionError::Transport {
        status: err.status().map(|status| status.as_u16()),
        message: err.to_string(),
    }
}

/// Surfaces server's `error` message or `fallback`.
async fn failure(response: Response, fallback: &str) -> SessionError {
    let status = response.status().as_u16();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| fallback.to_owned());

    SessionError::Transport {
        status: Some(status),
        message,
    }
}

impl Transport for HttpTransport {
    fn submit(
        &self,
        image: ImageUpload,
    ) -> BoxFuture<'static, Result<SubmitResponse, SessionError>> {
        let client = self.client.clone();
        let url = self.endpoint("api/process");

        async move {
            let part = multipart::Part::bytes(image.bytes)
                .file_name(image.name)
                .mime_str(&image.mime)
                .map_err(|err| SessionError::Validation(err.to_string()))?;

            let response = client
                .post(url?)
                .multipart(multipart::Form::new().part("image", part))
                .send()
                .await
                .map_err(network)?;

            if !response.status().is_success() {
                return Err(failure(response, "Failed to submit image").await);
            }

            response.json().await.map_err(network)
        }
        .boxed()
    }

    fn status(
        &self,
        session: SessionId,
    ) -> BoxFuture<'static, Result<StatusResponse, SessionError>> {
        let client = self.client.clone();
        let url = self.endpoint(&format!("api/sessions/{}", session));

        async move {
            let response = client.get(url?).send().await.map_err(network)?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(SessionError::NotFound);
            }
            if !response.status().is_success() {
                return Err(failure(response, "Failed to fetch session status").await);
            }

            response.json().await.map_err(network)
        }
        .boxed()
    }

    fn measurements(
        &self,
        request: MeasurementRequest,
    ) -> BoxFuture<'static, Result<MeasurementResponse, SessionError>> {
        let client = self.client.clone();
        let url = self.endpoint("api/measurements");

        async move {
            let response = client
                .post(url?)
                .json(&request)
                .send()
                .await
                .map_err(network)?;

            if !response.status().is_success() {
                return Err(failure(response, "Failed to compute measurements").await);
            }

            response.json().await.map_err(network)
        }
        .boxed()
    }
}
