//! Drives the signup form the way a user would and logs what happens.
//!
//! `RUST_LOG=debug` shows validation runs; `FORMKIT_USERS_API_URL` points the
//! availability lookup at another users service.

use std::error::Error;

use formkit::form::{SubmitOutcome, ValidationRun};
use formkit::remote::{UsersApi, UsersApiConfig};
use formkit::signup::{SignupForm, SignupPage};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn settle(run: Option<ValidationRun<SignupForm>>) -> Result<(), Box<dyn Error>> {
    if let Some(run) = run {
        let field = run.key();
        let outcome = run.finish().await?;
        info!(%field, ?outcome, "field validated");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = UsersApiConfig::from_env()?;
    info!(endpoint = %config.users_endpoint(), "using users service");
    let page = SignupPage::new(UsersApi::new(&config)?)?;
    let mut view = page.controller.attach_view();

    let frame = view.render()?;
    info!(render = frame.render_count, submit_enabled = frame.submit_enabled(), "initial render");

    // Leave the name empty and move on: the first blur shows the error.
    settle(page.username.blur()?).await?;
    let frame = view.render()?;
    info!(
        render = frame.render_count,
        error = ?frame.error_message(page.username.key()),
        "username blurred"
    );

    // Typing into a field that shows an error revalidates right away.
    settle(page.username.input("sam")?).await?;

    // A known address from the placeholder service is already taken.
    settle(page.email.input("Sincere@april.biz")?).await?;
    settle(page.email.blur()?).await?;
    let frame = view.render()?;
    info!(
        render = frame.render_count,
        error = ?frame.error_message(page.email.key()),
        "email checked"
    );

    settle(page.email.input("sam@example.com")?).await?;
    settle(page.channel.input("tech")?).await?;
    settle(page.age.input("30")?).await?;

    if page.controller.trigger().await? {
        info!("manual validation passed");
    }

    match page.submit().await? {
        SubmitOutcome::Submitted(values) => info!(?values, "submission accepted"),
        SubmitOutcome::Invalid(errors) => info!(?errors, "submission rejected"),
        SubmitOutcome::Abandoned => info!("submission abandoned"),
    }

    let frame = view.render()?;
    info!(
        render = frame.render_count,
        dirty = frame.snapshot.is_dirty,
        submit_enabled = frame.submit_enabled(),
        "after submit"
    );
    Ok(())
}
