//! `hwlink simulate`: drive a provider against the in-memory transport
//! and a simulated device, recording the connection state after every
//! step.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use hwlink_core::{
    AccountSelection, AdapterError, ConnectOutcome, ConnectionState, DeviceDescriptor,
    HardwareWalletProvider, HardwareWalletType, InMemoryTransport, ProviderConfig,
    SimulatedAdapterFactory, SimulatedDevice, TransportChannel,
};

use crate::cli::{GlobalOpts, Scenario, SimulateArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

const ACCOUNT_ADDRESS: &str = "0x5aeda56215b167893e80b4fe645ba6d5bab767de";
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const RACE_LATENCY: Duration = Duration::from_millis(150);

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    scenario: String,
    wallet: HardwareWalletType,
    steps: Vec<Step>,
    adapters_created: usize,
    max_live_adapters: usize,
}

#[derive(Debug, Serialize)]
struct Step {
    action: String,
    state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl SimulationReport {
    fn detail(&self, color: bool) -> String {
        let rows: Vec<StepRow> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepRow {
                index: i + 1,
                action: step.action.clone(),
                state: step.state.to_string(),
                note: step.note.clone().unwrap_or_default(),
            })
            .collect();

        let final_state = self
            .steps
            .last()
            .map_or_else(String::new, |s| output::state_label(&s.state, color));

        format!(
            "{} on {}\n{}\n{}",
            self.scenario,
            self.wallet.display_name(),
            output::render_table(&rows),
            output::render_detail(&[
                ("final state", final_state),
                ("adapters created", self.adapters_created.to_string()),
                ("max live adapters", self.max_live_adapters.to_string()),
            ]),
        )
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Simulation {
    scenario: &'static str,
    wallet: HardwareWalletType,
    channel: TransportChannel,
    descriptor: DeviceDescriptor,
    transport: Arc<InMemoryTransport>,
    factory: Arc<SimulatedAdapterFactory>,
    provider: HardwareWalletProvider,
    steps: Vec<Step>,
}

impl Simulation {
    fn new(
        scenario: &'static str,
        wallet: HardwareWalletType,
        device: SimulatedDevice,
        config: ProviderConfig,
    ) -> Result<Self, CliError> {
        let channel = wallet.transport_channel().ok_or_else(|| CliError::Validation {
            field: "wallet".into(),
            reason: format!("{} has no USB transport to simulate", wallet.display_name()),
        })?;
        let filter = wallet.device_filters().first().ok_or_else(|| CliError::Validation {
            field: "wallet".into(),
            reason: format!("no device filters known for {}", wallet.display_name()),
        })?;
        let descriptor = DeviceDescriptor::new(filter.vendor_id, filter.product_id.unwrap_or(0x0001))
            .with_product_name(format!("Simulated {}", wallet.display_name()));

        let transport = Arc::new(InMemoryTransport::new());
        transport.pair(channel, descriptor.clone());
        let factory = Arc::new(SimulatedAdapterFactory::new(Arc::new(device)));
        let provider = HardwareWalletProvider::new(config, transport.clone(), factory.clone());

        Ok(Self {
            scenario,
            wallet,
            channel,
            descriptor,
            transport,
            factory,
            provider,
            steps: Vec::new(),
        })
    }

    fn device(&self) -> &Arc<SimulatedDevice> {
        self.factory.device()
    }

    fn record(&mut self, action: impl Into<String>, note: Option<String>) {
        let state = self.provider.connection_state();
        let action = action.into();
        tracing::info!(action = action.as_str(), %state, "simulation step");
        self.steps.push(Step {
            action,
            state,
            note,
        });
    }

    fn fail(&self, expected: &str) -> CliError {
        CliError::Simulation {
            scenario: self.scenario.into(),
            expected: expected.into(),
        }
    }

    /// Wait for a state pushed by a background task.
    async fn settle(
        &self,
        expected: &str,
        predicate: impl FnMut(&ConnectionState) -> bool,
    ) -> Result<(), CliError> {
        let mut states = self.provider.subscribe();
        match tokio::time::timeout(SETTLE_TIMEOUT, states.wait_for(predicate)).await {
            Ok(Some(_)) => Ok(()),
            _ => Err(self.fail(expected)),
        }
    }

    async fn select_account(&mut self) {
        self.provider
            .set_account(AccountSelection::hardware(self.wallet, ACCOUNT_ADDRESS))
            .await;
        let note = self.provider.device_id().map(|id| format!("device {id}"));
        self.record("select hardware account", note);
    }

    async fn verify(&mut self) -> bool {
        let ready = self.provider.ensure_device_ready(None).await;
        let note = if ready { "ready" } else { "not ready" };
        self.record("verify device", Some(note.into()));
        ready
    }

    async fn finish(self) -> SimulationReport {
        self.provider.shutdown().await;
        SimulationReport {
            scenario: self.scenario.into(),
            wallet: self.wallet,
            adapters_created: self.factory.created_count(),
            max_live_adapters: self.factory.max_live(),
            steps: self.steps,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let provider_config = config::load(global)?.to_provider_config()?;
    let wallet = args.wallet;

    let report = match args.scenario {
        Scenario::Happy => happy(wallet, provider_config).await?,
        Scenario::Locked => locked(wallet, provider_config).await?,
        Scenario::WrongApp => wrong_app(wallet, provider_config).await?,
        Scenario::Unplug => unplug(wallet, provider_config).await?,
        Scenario::Race => race(wallet, provider_config).await?,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &report, |r| r.detail(color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn ready_device(wallet: HardwareWalletType) -> SimulatedDevice {
    match wallet.expected_app_name() {
        Some(app) => SimulatedDevice::with_app(app),
        None => SimulatedDevice::new(),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

async fn happy(
    wallet: HardwareWalletType,
    config: ProviderConfig,
) -> Result<SimulationReport, CliError> {
    let mut sim = Simulation::new("happy", wallet, ready_device(wallet), config)?;

    sim.select_account().await;
    if !sim.verify().await {
        return Err(sim.fail("ready"));
    }

    let signed = sim
        .provider
        .execute_with_wallet(|adapter| async move {
            Ok::<_, AdapterError>(format!("signed by {}", adapter.wallet_type().display_name()))
        })
        .await;
    match signed {
        Ok(note) => sim.record("sign request", Some(note)),
        Err(e) => {
            sim.record("sign request", Some(e.to_string()));
            return Err(sim.fail("a signature"));
        }
    }

    sim.provider.disconnect().await;
    sim.record("disconnect", None);
    Ok(sim.finish().await)
}

async fn locked(
    wallet: HardwareWalletType,
    config: ProviderConfig,
) -> Result<SimulationReport, CliError> {
    let device = ready_device(wallet);
    device.lock();
    let mut sim = Simulation::new("locked", wallet, device, config)?;

    sim.select_account().await;
    if sim.verify().await || !sim.provider.connection_state().is_error() {
        return Err(sim.fail("a locked error"));
    }

    sim.device().unlock();
    sim.record("unlock device", None);

    let ready = sim.provider.retry().await;
    sim.record("retry", Some(if ready { "ready" } else { "not ready" }.into()));
    if !ready {
        return Err(sim.fail("ready after unlock"));
    }
    Ok(sim.finish().await)
}

async fn wrong_app(
    wallet: HardwareWalletType,
    config: ProviderConfig,
) -> Result<SimulationReport, CliError> {
    let expected = wallet.expected_app_name().ok_or_else(|| CliError::Validation {
        field: "wallet".into(),
        reason: format!("{} has no on-device app to switch", wallet.display_name()),
    })?;
    let mut sim = Simulation::new("wrong-app", wallet, SimulatedDevice::with_app("Bitcoin"), config)?;

    sim.select_account().await;
    if sim.verify().await {
        return Err(sim.fail("an awaiting-app state"));
    }

    sim.device().open_app(expected);
    sim.settle("ready", |s| *s == ConnectionState::Ready).await?;
    sim.record(format!("open {expected} app"), None);
    Ok(sim.finish().await)
}

async fn unplug(
    wallet: HardwareWalletType,
    config: ProviderConfig,
) -> Result<SimulationReport, CliError> {
    let mut sim = Simulation::new("unplug", wallet, ready_device(wallet), config)?;

    sim.select_account().await;
    if !sim.verify().await {
        return Err(sim.fail("ready"));
    }

    sim.device().set_present(false);
    sim.transport.unplug(sim.channel, sim.descriptor.clone());
    sim.settle("disconnected", |s| *s == ConnectionState::Disconnected)
        .await?;
    sim.record("pull cable", None);

    sim.device().set_present(true);
    sim.transport.plug_in(sim.channel, sim.descriptor.clone());
    sim.settle("reconnected", ConnectionState::is_connected).await?;
    let note = sim.provider.device_id().map(|id| format!("device {id}"));
    sim.record("reinsert cable", note);
    Ok(sim.finish().await)
}

async fn race(
    wallet: HardwareWalletType,
    config: ProviderConfig,
) -> Result<SimulationReport, CliError> {
    let mut sim = Simulation::new("race", wallet, ready_device(wallet), config)?;
    sim.device().set_latency(RACE_LATENCY);

    let first_id = sim.descriptor.device_id();
    let second = DeviceDescriptor::new(sim.descriptor.vendor_id, sim.descriptor.product_id.wrapping_add(1));
    sim.transport.pair(sim.channel, second.clone());

    let first = tokio::spawn({
        let provider = sim.provider.clone();
        let id = first_id.clone();
        async move { provider.connect(wallet, Some(id)).await }
    });
    while sim.factory.created_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let second_outcome = sim.provider.connect(wallet, Some(second.device_id())).await;
    let first_outcome = first.await.map_err(|_| sim.fail("the first connect to finish"))?;

    sim.record(format!("connect device {first_id}"), Some(outcome_note(&first_outcome)));
    sim.record(
        format!("connect device {}", second.device_id()),
        Some(outcome_note(&second_outcome)),
    );

    if first_outcome != ConnectOutcome::Superseded
        || !second_outcome.is_connected()
        || sim.factory.max_live() > 1
    {
        return Err(sim.fail("a single winning connection"));
    }
    Ok(sim.finish().await)
}

fn outcome_note(outcome: &ConnectOutcome) -> String {
    match outcome {
        ConnectOutcome::Connected => "connected".into(),
        ConnectOutcome::Superseded => "superseded by a newer attempt".into(),
        ConnectOutcome::Aborted => "aborted".into(),
        ConnectOutcome::Failed(e) => format!("failed: {e}"),
    }
}
