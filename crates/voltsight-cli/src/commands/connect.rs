//! Interactive onboarding: connect a utility account and generate insights

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use voltsight_core::{
    Config, CredentialCheck, InsightsWorkflow, MonthlyPrediction, OnboardingError,
    OnboardingSession, PredictionService, UtilityProvider, WorkflowError,
};

use super::print_insights;

pub async fn cmd_connect(
    config: &Config,
    utility: Option<&str>,
    email: Option<&str>,
    no_insights: bool,
) -> Result<()> {
    let workflow =
        InsightsWorkflow::from_config(config).context("Cannot connect a utility account")?;
    let utility = utility.unwrap_or(&config.customer.utility);
    let email = email.unwrap_or(&config.customer.contact_email);

    let interrupt = PollInterrupt::new();
    let listener = interrupt.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !listener.interrupt() {
                eprintln!();
                std::process::exit(130);
            }
        }
    });

    // Prompts block this thread; the listener runs on the worker pool
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let monthly = run_connect(
        &workflow,
        &mut input,
        utility,
        email,
        no_insights,
        &interrupt,
    )
    .await?;

    if let Some(monthly) = monthly {
        print_insights(&monthly);
    }
    Ok(())
}

/// Ctrl-C handling for `connect`
///
/// Only bill polling is cancellable. Outside it an interrupt is reported as
/// unhandled so the caller can exit.
#[derive(Debug, Clone, Default)]
pub struct PollInterrupt {
    token: CancellationToken,
    armed: Arc<AtomicBool>,
}

impl PollInterrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel polling if it is running; `false` when nothing was cancelled
    pub fn interrupt(&self) -> bool {
        if self.armed.load(Ordering::SeqCst) {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    fn arm(&self) -> &CancellationToken {
        self.armed.store(true, Ordering::SeqCst);
        &self.token
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

/// Read one line; `None` on end of input
fn prompt<R: BufRead>(input: &mut R, message: &str) -> Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Drive one onboarding session from prompt answers read from `input`
///
/// Returns the prediction, or `None` when the user skipped, asked for bills
/// only, or cancelled while waiting for bills.
pub async fn run_connect<P, S, R>(
    workflow: &InsightsWorkflow<P, S>,
    input: &mut R,
    utility: &str,
    email: &str,
    no_insights: bool,
    interrupt: &PollInterrupt,
) -> Result<Option<MonthlyPrediction>>
where
    P: UtilityProvider,
    S: PredictionService,
    R: BufRead,
{
    let mut session = OnboardingSession::new();

    let answer = prompt(
        input,
        &format!("Connect your {} account? [Y/n] ", utility),
    )?;
    let declined = match answer.as_deref() {
        None => true,
        Some(a) => a.eq_ignore_ascii_case("n") || a.eq_ignore_ascii_case("no"),
    };
    if declined {
        workflow.skip(&mut session)?;
        println!("Skipped. No utility data will be retrieved.");
        return Ok(None);
    }

    let customer = workflow
        .connect_with(&mut session, utility, email)
        .await
        .context("Failed to create utility customer")?;

    println!();
    println!("🔗 Customer {} created", customer.id);
    if let Some(link) = session.onboarding_link() {
        println!("   Open this link to enter your utility credentials:");
        println!("   {}", link);
    }
    println!();

    loop {
        let line = prompt(
            input,
            "Press Enter once you have submitted your credentials... ",
        )?;
        if line.is_none() {
            bail!("Input closed before credentials were confirmed");
        }

        match workflow
            .confirm_credentials(&mut session)
            .await
            .context("Failed to check credential status")?
        {
            CredentialCheck::Confirmed => {
                println!("✅ Credentials received");
                break;
            }
            CredentialCheck::Pending => {
                println!("⚠️  Credentials not received yet. Finish the onboarding form and try again.");
            }
        }
    }

    println!("⏳ Waiting for bills (Ctrl-C to stop)...");
    let polled = workflow.await_bills(&mut session, interrupt.arm()).await;
    interrupt.disarm();
    let bill_count = match polled {
        Ok(count) => count,
        Err(WorkflowError::Onboarding(OnboardingError::Cancelled { checks })) => {
            println!("Stopped waiting after {} status checks.", checks);
            println!(
                "   Check progress later with: voltsight status {}",
                customer.id
            );
            return Ok(None);
        }
        Err(e) => return Err(e).context("Bills did not become available"),
    };
    println!("✅ Retrieved {} bills", bill_count);

    if no_insights {
        return Ok(None);
    }

    let monthly = workflow
        .generate_insights(&session)
        .await
        .context("Failed to generate insights")?;
    Ok(Some(monthly))
}
