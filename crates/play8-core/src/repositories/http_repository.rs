use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::agent_repository::{AgentRepository, BoxFuture};
use super::error::{ApiError, ApiResult};
use crate::config::ClientConfig;
use crate::models::conversation::{ChatRequest, ConversationDetail, ConversationSummary};
use crate::models::plan::{NewPlanItem, PlanItem};
use crate::services::sse_decoder::{RecordStream, decode_byte_stream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ProgressBody {
    checked_steps: Vec<bool>,
}

/// [`AgentRepository`] backed by the REST + SSE backend.
#[derive(Clone)]
pub struct HttpAgentRepository {
    client: Client,
    config: ClientConfig,
}

impl HttpAgentRepository {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let config = config.normalized();
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| ApiError::unavailable("Session cookie is not a valid header value"))?;
            headers.insert(COOKIE, value);
        }

        // No overall timeout on the client: chat bodies stream for as long as
        // the reply takes. Plain requests set one per call.
        let client = Client::builder()
            .user_agent(concat!("play8-client/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.config.endpoint(path))
            .timeout(self.config.timeout())
    }
}

fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        debug!(status = status.as_u16(), url = %response.url(), "Backend returned an error status");
        Err(ApiError::from_status(status.as_u16()))
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
    let response = ensure_success(request.send().await?)?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn send_empty(request: RequestBuilder) -> ApiResult<()> {
    ensure_success(request.send().await?)?;
    Ok(())
}

impl AgentRepository for HttpAgentRepository {
    fn send_chat(&self, request: ChatRequest) -> BoxFuture<'static, ApiResult<RecordStream>> {
        let builder = self
            .client
            .post(self.config.endpoint("agent/chat"))
            .json(&request);

        Box::pin(async move {
            let response = ensure_success(builder.send().await?)?;
            Ok(decode_byte_stream(response.bytes_stream()))
        })
    }

    fn list_conversations(&self) -> BoxFuture<'static, ApiResult<Vec<ConversationSummary>>> {
        let builder = self.request(reqwest::Method::GET, "agent/conversations");
        Box::pin(send_json(builder))
    }

    fn get_conversation(&self, id: &str) -> BoxFuture<'static, ApiResult<ConversationDetail>> {
        let builder = self.request(reqwest::Method::GET, &format!("agent/conversations/{id}"));
        Box::pin(send_json(builder))
    }

    fn delete_conversation(&self, id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let builder = self.request(reqwest::Method::DELETE, &format!("agent/conversations/{id}"));
        Box::pin(send_empty(builder))
    }

    fn update_block_progress(
        &self,
        content_block_id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, ApiResult<()>> {
        let builder = self
            .request(
                reqwest::Method::PATCH,
                &format!("agent/content-blocks/{content_block_id}/progress"),
            )
            .json(&ProgressBody { checked_steps });
        Box::pin(send_empty(builder))
    }

    fn list_plan(&self) -> BoxFuture<'static, ApiResult<Vec<PlanItem>>> {
        let builder = self.request(reqwest::Method::GET, "plan");
        Box::pin(async move {
            let mut items: Vec<PlanItem> = send_json(builder).await?;
            items.iter_mut().for_each(PlanItem::normalize);
            Ok(items)
        })
    }

    fn add_plan_item(&self, item: NewPlanItem) -> BoxFuture<'static, ApiResult<PlanItem>> {
        let builder = self.request(reqwest::Method::POST, "plan").json(&item);
        Box::pin(async move {
            let mut created: PlanItem = send_json(builder).await?;
            created.normalize();
            Ok(created)
        })
    }

    fn update_plan_progress(
        &self,
        id: &str,
        checked_steps: Vec<bool>,
    ) -> BoxFuture<'static, ApiResult<PlanItem>> {
        let builder = self
            .request(reqwest::Method::PATCH, &format!("plan/{id}/progress"))
            .json(&ProgressBody { checked_steps });
        Box::pin(async move {
            let mut updated: PlanItem = send_json(builder).await?;
            updated.normalize();
            Ok(updated)
        })
    }

    fn remove_plan_item(&self, id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let builder = self.request(reqwest::Method::DELETE, &format!("plan/{id}"));
        Box::pin(send_empty(builder))
    }
}
