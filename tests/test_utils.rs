use dotenvy::dotenv;
use memorial_park::{ParkClient, ParkConfig};
use std::sync::{Arc, Mutex, Once};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

static INIT_LOGGER: Once = Once::new();

pub fn initialize_logger_once() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub mod shared {
    use super::*;

    /// Client for a real backend configured through `.env`, or `None` when the
    /// `PARK_*` variables are absent so live tests can be skipped.
    #[allow(dead_code)]
    pub fn live_client() -> Option<ParkClient> {
        initialize_logger_once();
        dotenv().ok();
        let config = ParkConfig::from_env().ok()?;
        Some(ParkClient::from_config(&config).expect("Failed to create ParkClient"))
    }

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: String,
        pub target: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl RecordedRequest {
        #[allow(dead_code)]
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        #[allow(dead_code)]
        pub fn path(&self) -> &str {
            self.target.split('?').next().unwrap_or("")
        }
    }

    pub struct MockResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: Option<String>,
    }

    impl MockResponse {
        #[allow(dead_code)]
        pub fn json(status: u16, body: serde_json::Value) -> Self {
            MockResponse {
                status,
                headers: Vec::new(),
                body: Some(body.to_string()),
            }
        }

        #[allow(dead_code)]
        pub fn empty(status: u16) -> Self {
            MockResponse {
                status,
                headers: Vec::new(),
                body: None,
            }
        }

        #[allow(dead_code)]
        pub fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.push((name.to_string(), value.to_string()));
            self
        }

        #[allow(dead_code)]
        fn into_template(self) -> ResponseTemplate {
            let mut template = ResponseTemplate::new(self.status);
            for (name, value) in &self.headers {
                template = template.insert_header(name.as_str(), value.as_str());
            }
            match self.body {
                Some(body) => template.set_body_raw(body.into_bytes(), "application/json"),
                None => template,
            }
        }
    }

    impl From<&Request> for RecordedRequest {
        fn from(request: &Request) -> Self {
            let target = match request.url.query() {
                Some(query) => format!("{}?{}", request.url.path(), query),
                None => request.url.path().to_string(),
            };
            RecordedRequest {
                method: request.method.to_string(),
                target,
                headers: request
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect(),
                body: String::from_utf8_lossy(&request.body).to_string(),
            }
        }
    }

    /// Mock backend answering every request through `handler` and recording what it saw.
    pub struct MockBackend {
        pub server: MockServer,
        pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockBackend {
        #[allow(dead_code)]
        pub async fn start<F>(handler: F) -> MockBackend
        where
            F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
        {
            initialize_logger_once();
            let server = MockServer::start().await;
            let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));

            let recorded = requests.clone();
            Mock::given(any())
                .respond_with(move |request: &Request| {
                    let request = RecordedRequest::from(request);
                    let response = handler(&request);
                    recorded.lock().unwrap().push(request);
                    response.into_template()
                })
                .mount(&server)
                .await;

            MockBackend { server, requests }
        }

        #[allow(dead_code)]
        pub fn client(&self) -> ParkClient {
            ParkClient::new(&self.server.uri(), "anon-key").expect("Failed to create ParkClient")
        }

        #[allow(dead_code)]
        pub fn recorded(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }
}
