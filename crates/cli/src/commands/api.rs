//! Commands that talk to the Loose Gallery API.
//!
//! # Environment Variables
//!
//! - `LOOSEGALLERY_API_KEYS` - Comma-separated `name=key` pairs
//! - `LOOSEGALLERY_RETURN_URL` - Storefront URL the editor returns to
//! - `LOOSEGALLERY_LOCK_MODE` - `remote` or `local`

use loose_gallery_core::{PreviewSize, ProductId, Serial};
use loose_gallery_designs::api::{EditorRequest, ImageSpec};
use loose_gallery_designs::{ApiClients, DesignApi, DesignConfig, LooseGalleryClient};
use tracing::info;

use super::{CliError, print_json};

/// Build the client for a credential name, or the default one.
fn client(credential: Option<&str>) -> Result<LooseGalleryClient, CliError> {
    let config = DesignConfig::from_env()?;
    let clients = ApiClients::from_config(&config)?;

    let client = match credential {
        Some(name) => clients.get(name),
        None => clients.default_client(),
    };
    client
        .cloned()
        .ok_or_else(|| CliError::UnknownCredential(credential.unwrap_or("default").to_owned()))
}

/// Verify the credential and print the domain it belongs to.
pub async fn test_connection(credential: Option<&str>) -> Result<(), CliError> {
    let client = client(credential)?;
    info!(credential = client.credential(), "Testing connection...");

    let domain = client.test_connection().await?;
    info!(domain = %domain.name, "Connection successful");
    print_json(&domain)
}

/// Print an editor deep link.
pub fn editor_url(
    credential: Option<&str>,
    domain: &str,
    template: &str,
    design: Option<&str>,
    product: Option<i64>,
) -> Result<(), CliError> {
    let client = client(credential)?;
    let template = Serial::parse(template)?;

    let request = match (design, product) {
        (Some(design), _) => EditorRequest::edit(domain, template, Serial::parse(design)?),
        (None, Some(product)) => EditorRequest::start(domain, template, ProductId::new(product)),
        (None, None) => EditorRequest {
            domain_id: domain.to_owned(),
            template,
            design: None,
            product_id: None,
            extra: Vec::new(),
        },
    };

    let url = client.build_editor_url(&request);
    #[allow(clippy::print_stdout)]
    {
        println!("{url}");
    }
    Ok(())
}

pub async fn preview(
    credential: Option<&str>,
    serial: &str,
    size: PreviewSize,
) -> Result<(), CliError> {
    let serial = Serial::parse(serial)?;
    let preview = client(credential)?.get_design_preview(&serial, size).await?;
    print_json(&preview)
}

pub async fn info(credential: Option<&str>, serial: &str) -> Result<(), CliError> {
    let serial = Serial::parse(serial)?;
    let design = client(credential)?.get_design_info(&serial).await?;
    print_json(&design)
}

/// Start a high-resolution render.
pub async fn render_request(
    credential: Option<&str>,
    serial: &str,
    spec: ImageSpec,
) -> Result<(), CliError> {
    let serial = Serial::parse(serial)?;
    let request = client(credential)?
        .request_high_res_image(&serial, &spec)
        .await?;
    info!(%serial, request_id = ?request.request_id, "Render requested");
    print_json(&request)
}

pub async fn render_poll(
    credential: Option<&str>,
    serial: &str,
    spec: ImageSpec,
) -> Result<(), CliError> {
    let serial = Serial::parse(serial)?;
    let status = client(credential)?.poll_image_status(&serial, &spec).await?;
    print_json(&status)
}

/// Lock a design, e.g. for an order placed outside the storefront.
pub async fn lock(credential: Option<&str>, serial: &str) -> Result<(), CliError> {
    let serial = Serial::parse(serial)?;
    let outcome = client(credential)?.lock_design(&serial).await?;
    info!(%serial, mode = %outcome.mode(), "Design locked");
    print_json(&outcome)
}
