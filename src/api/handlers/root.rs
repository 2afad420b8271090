use axum::response::IntoResponse;

// axum handler for the bare root; everything interesting lives under the
// documented routes.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::root;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn root_reports_name_and_version() {
        let response = root().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
