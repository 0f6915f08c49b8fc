use anyhow::Result;
use async_trait::async_trait;
use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Mutex;
use vouchkit_sdk::advanced::calls::{Call, SignedExtrinsic};
use vouchkit_sdk::config::ContractConfig;
use vouchkit_sdk::core::connection::{
    ChainConnection, ChainEvent, ConnectionError, Connector, FinalizedBlock, StatusStream, TxStatus,
};
use vouchkit_sdk::core::constants::TOKEN_SCALE;
use vouchkit_sdk::interface::keyring::{
    KeyringCommandReply, KeyringData, KeyringError, KeyringQueryReply, ACCOUNT_DATA,
    ADDRESS_FROM_USER_ADDRESS, ADDRESS_FROM_USER_CODED_NAME, BIND_TO_USER_ADDRESS,
    BIND_TO_USER_CODED_NAME, KEYRING_IDL, KEYRING_SERVICE,
};
use vouchkit_sdk::interface::{decode_route, encode_route};
use vouchkit_sdk::{
    BlockNumber, ChainContext, ProgressObserver, SdkConfig, Step, StepOutcome, VoucherDetails,
    VoucherId,
};

pub const ENDPOINT: &str = "ws://simulated:9944";
pub const START_HEIGHT: BlockNumber = 100;

/// Gas the node suggests for any message
pub const GAS_ESTIMATE: u64 = 1_000_000_000;
/// Raw units charged per unit of gas; one estimated message costs one token
pub const GAS_PRICE: u128 = 1_000;

pub const SPONSOR_FUNDS: u128 = 10_000 * TOKEN_SCALE;

pub const PING_IDL: &str = r#"
constructor {
  New : ();
};

service Ping {
  Ping : () -> str;
  query Counter : () -> u32;

  events {
    Pinged: actor_id;
  }
};
"#;

//=============================================================================
// Simulated Chain
//=============================================================================

/// How the next submission is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Finalize,
    /// Included, retracted, re-included, then finalized
    Reorg,
    /// Included but never finalized; the stream stays open
    Stall,
    /// Dropped from the pool, state untouched
    Drop,
    /// Rejected by the pool, state untouched
    Invalid,
    /// The node refuses the broadcast
    RejectBroadcast,
}

/// The keyring program also serves the `Ping` service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Program {
    Keyring,
    Ping,
}

#[derive(Default)]
struct Keyring {
    by_user: HashMap<[u8; 32], [u8; 32]>,
    by_coded_name: HashMap<String, [u8; 32]>,
    data: HashMap<[u8; 32], KeyringData>,
}

pub struct ChainState {
    pub height: BlockNumber,
    pub balances: HashMap<Pubkey, u128>,
    pub vouchers: HashMap<VoucherId, VoucherDetails>,
    issued: Vec<VoucherId>,
    /// Every call that reached the chain, accepted or not
    pub calls: Vec<(Pubkey, Call)>,
    programs: HashMap<Pubkey, Program>,
    keyring: Keyring,
    ping_counter: u32,
    scripts: VecDeque<Script>,
    stalled: Vec<UnboundedSender<TxStatus>>,
    nonce: u64,
}

pub struct SimulatedChain {
    state: Mutex<ChainState>,
    ready: AtomicBool,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                height: START_HEIGHT,
                balances: HashMap::new(),
                vouchers: HashMap::new(),
                issued: Vec::new(),
                calls: Vec::new(),
                programs: HashMap::new(),
                keyring: Keyring::default(),
                ping_counter: 0,
                scripts: VecDeque::new(),
                stalled: Vec::new(),
                nonce: 0,
            }),
            ready: AtomicBool::new(true),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub async fn deploy_keyring(&self, program_id: Pubkey) {
        self.state.lock().await.programs.insert(program_id, Program::Keyring);
    }

    pub async fn deploy_ping(&self, program_id: Pubkey) {
        self.state.lock().await.programs.insert(program_id, Program::Ping);
    }

    pub async fn fund(&self, account: &Pubkey, amount: u128) {
        *self.state.lock().await.balances.entry(*account).or_default() += amount;
    }

    pub async fn set_balance(&self, account: &Pubkey, amount: u128) {
        self.state.lock().await.balances.insert(*account, amount);
    }

    pub async fn balance_of(&self, account: &Pubkey) -> u128 {
        self.state.lock().await.balances.get(account).copied().unwrap_or(0)
    }

    pub async fn advance_blocks(&self, blocks: BlockNumber) {
        self.state.lock().await.height += blocks;
    }

    pub async fn height(&self) -> BlockNumber {
        self.state.lock().await.height
    }

    pub async fn voucher(&self, voucher_id: &VoucherId) -> Option<VoucherDetails> {
        self.state.lock().await.vouchers.get(voucher_id).cloned()
    }

    /// Queue how upcoming submissions are reported, in order
    pub async fn script(&self, scripts: impl IntoIterator<Item = Script>) {
        self.state.lock().await.scripts.extend(scripts);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.iter().map(|(_, call)| call.clone()).collect()
    }

    pub async fn update_calls(&self) -> Vec<Call> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| matches!(call, Call::UpdateVoucher { .. }))
            .collect()
    }

    pub async fn ping_counter(&self) -> u32 {
        self.state.lock().await.ping_counter
    }
}

impl ChainState {
    fn next_hash(&mut self, tag: &[u8], seed: &[u8]) -> Hash {
        self.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(tag);
        hasher.update(seed);
        hasher.update(self.nonce.to_le_bytes());
        Hash::new_from_array(hasher.finalize().into())
    }

    fn debit(&mut self, account: &Pubkey, amount: u128) -> std::result::Result<(), String> {
        let balance = self.balances.entry(*account).or_default();
        if *balance < amount {
            return Err(format!("InsufficientBalance: {account}"));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, account: &Pubkey, amount: u128) {
        *self.balances.entry(*account).or_default() += amount;
    }

    /// Dispatch a call. On error nothing is changed.
    fn apply(&mut self, signer: Pubkey, call: &Call) -> std::result::Result<Vec<ChainEvent>, String> {
        match call {
            Call::IssueVoucher {
                owner,
                balance,
                duration,
                programs,
            } => {
                let owner = Pubkey::new_from_array(*owner);
                self.debit(&signer, *balance)?;

                let voucher_id = VoucherId(self.next_hash(b"voucher", owner.as_ref()).to_bytes());
                self.credit(&voucher_id.account(), *balance);
                self.vouchers.insert(
                    voucher_id,
                    VoucherDetails {
                        owner,
                        issuer: signer,
                        programs: Some(programs.iter().copied().map(Pubkey::new_from_array).collect()),
                        expiry: self.height + duration,
                    },
                );
                self.issued.push(voucher_id);
                Ok(vec![ChainEvent::VoucherIssued { owner, voucher_id }])
            },
            Call::UpdateVoucher {
                owner,
                voucher_id,
                balance_top_up,
                prolong_duration,
            } => {
                let owner = Pubkey::new_from_array(*owner);
                let voucher = self
                    .vouchers
                    .get(voucher_id)
                    .ok_or_else(|| "InexistentVoucher".to_string())?;
                if voucher.owner != owner {
                    return Err("BadOwner".to_string());
                }
                if voucher.issuer != signer {
                    return Err("BadOrigin".to_string());
                }

                if let Some(amount) = balance_top_up {
                    self.debit(&signer, *amount)?;
                    self.credit(&voucher_id.account(), *amount);
                }
                let mut new_expiry = None;
                if let Some(blocks) = prolong_duration {
                    if let Some(voucher) = self.vouchers.get_mut(voucher_id) {
                        voucher.expiry += blocks;
                        new_expiry = Some(voucher.expiry);
                    }
                }
                Ok(vec![ChainEvent::VoucherUpdated {
                    owner,
                    voucher_id: *voucher_id,
                    new_expiry,
                    balance_top_up: *balance_top_up,
                }])
            },
            Call::SendMessage {
                destination,
                payload,
                gas_limit,
                value,
                voucher_id,
            } => {
                let destination = Pubkey::new_from_array(*destination);
                let program = *self
                    .programs
                    .get(&destination)
                    .ok_or_else(|| "ProgramNotFound".to_string())?;
                let charge = *gas_limit as u128 * GAS_PRICE;

                let payer = match voucher_id {
                    Some(voucher_id) => {
                        let voucher = self
                            .vouchers
                            .get(voucher_id)
                            .ok_or_else(|| "InexistentVoucher".to_string())?;
                        if voucher.owner != signer {
                            return Err("BadOrigin".to_string());
                        }
                        if voucher.is_expired_at(self.height) {
                            return Err("VoucherExpired".to_string());
                        }
                        if !voucher.allows_program(&destination) {
                            return Err("InappropriateDestination".to_string());
                        }
                        voucher_id.account()
                    },
                    None => signer,
                };
                if self.balances.get(&payer).copied().unwrap_or(0) < charge + value {
                    return Err(format!("InsufficientBalance: {payer}"));
                }

                let reply = self.handle_message(program, signer, payload)?;
                self.debit(&payer, charge + value)?;
                self.credit(&destination, *value);

                let message_id = self.next_hash(b"message", payload);
                Ok(vec![
                    ChainEvent::MessageQueued {
                        message_id,
                        source: signer,
                        destination,
                    },
                    ChainEvent::Reply {
                        reply_to: message_id,
                        payload: reply,
                    },
                ])
            },
        }
    }

    fn handle_message(
        &mut self,
        program: Program,
        source: Pubkey,
        payload: &[u8],
    ) -> std::result::Result<Vec<u8>, String> {
        let (service, method, mut args) =
            decode_route(payload).ok_or_else(|| "UnroutableMessage".to_string())?;
        let mut reply = encode_route(&service, &method);

        match (program, service.as_str(), method.as_str()) {
            (_, "Ping", "Ping") => {
                self.ping_counter += 1;
                reply.extend(borsh::to_vec(&"Pong".to_string()).map_err(|e| e.to_string())?);
            },
            (Program::Keyring, KEYRING_SERVICE, BIND_TO_USER_ADDRESS) => {
                let (user, data) =
                    <([u8; 32], KeyringData)>::deserialize(&mut args).map_err(|e| e.to_string())?;
                let outcome = self.bind(source, data, |keyring| {
                    if keyring.by_user.contains_key(&user) {
                        return Err(KeyringError::UserAddressAlreadyExists);
                    }
                    keyring.by_user.insert(user, source.to_bytes());
                    Ok(())
                });
                reply.extend(borsh::to_vec(&outcome).map_err(|e| e.to_string())?);
            },
            (Program::Keyring, KEYRING_SERVICE, BIND_TO_USER_CODED_NAME) => {
                let (coded, data) =
                    <(String, KeyringData)>::deserialize(&mut args).map_err(|e| e.to_string())?;
                let outcome = self.bind(source, data, |keyring| {
                    if keyring.by_coded_name.contains_key(&coded) {
                        return Err(KeyringError::UserCodedNameAlreadyExists);
                    }
                    keyring.by_coded_name.insert(coded.clone(), source.to_bytes());
                    Ok(())
                });
                reply.extend(borsh::to_vec(&outcome).map_err(|e| e.to_string())?);
            },
            _ => return Err(format!("UnknownMethod: {service}/{method}")),
        }

        Ok(reply)
    }

    fn bind(
        &mut self,
        source: Pubkey,
        data: KeyringData,
        register: impl FnOnce(&mut Keyring) -> std::result::Result<(), KeyringError>,
    ) -> KeyringCommandReply {
        let keyring_address = source.to_bytes();
        if self.keyring.data.contains_key(&keyring_address) {
            return KeyringCommandReply::Error(KeyringError::KeyringAddressAlreadyExists);
        }
        match register(&mut self.keyring) {
            Ok(()) => {
                self.keyring.data.insert(keyring_address, data);
                KeyringCommandReply::KeyringAccountSet
            },
            Err(err) => KeyringCommandReply::Error(err),
        }
    }

    fn query(&self, program: Program, payload: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let (service, method, mut args) =
            decode_route(payload).ok_or_else(|| "UnroutableQuery".to_string())?;
        let mut reply = encode_route(&service, &method);

        let encoded = match (program, service.as_str(), method.as_str()) {
            (_, "Ping", "Counter") => borsh::to_vec(&self.ping_counter),
            (Program::Keyring, KEYRING_SERVICE, ADDRESS_FROM_USER_ADDRESS) => {
                let user = <[u8; 32]>::deserialize(&mut args).map_err(|e| e.to_string())?;
                borsh::to_vec(&KeyringQueryReply::SignlessAccountAddress(
                    self.keyring.by_user.get(&user).copied(),
                ))
            },
            (Program::Keyring, KEYRING_SERVICE, ADDRESS_FROM_USER_CODED_NAME) => {
                let coded = String::deserialize(&mut args).map_err(|e| e.to_string())?;
                borsh::to_vec(&KeyringQueryReply::SignlessAccountAddress(
                    self.keyring.by_coded_name.get(&coded).copied(),
                ))
            },
            (Program::Keyring, KEYRING_SERVICE, ACCOUNT_DATA) => {
                let address = <[u8; 32]>::deserialize(&mut args).map_err(|e| e.to_string())?;
                borsh::to_vec(&KeyringQueryReply::SignlessAccountData(
                    self.keyring.data.get(&address).cloned(),
                ))
            },
            _ => return Err(format!("UnknownQuery: {service}/{method}")),
        };

        reply.extend(encoded.map_err(|e| e.to_string())?);
        Ok(reply)
    }
}

#[async_trait]
impl ChainConnection for SimulatedChain {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn finalized_block_number(&self) -> std::result::Result<BlockNumber, ConnectionError> {
        Ok(self.state.lock().await.height)
    }

    async fn free_balance(&self, account: &Pubkey) -> std::result::Result<u128, ConnectionError> {
        Ok(self.balance_of(account).await)
    }

    async fn voucher_details(
        &self,
        owner: &Pubkey,
        voucher_id: &VoucherId,
    ) -> std::result::Result<Option<VoucherDetails>, ConnectionError> {
        let state = self.state.lock().await;
        Ok(state
            .vouchers
            .get(voucher_id)
            .filter(|voucher| voucher.owner == *owner)
            .cloned())
    }

    async fn vouchers_for_account(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> std::result::Result<Vec<VoucherId>, ConnectionError> {
        let state = self.state.lock().await;
        Ok(state
            .issued
            .iter()
            .filter(|id| {
                state
                    .vouchers
                    .get(*id)
                    .map(|v| v.owner == *owner && v.allows_program(program_id))
                    .unwrap_or(false)
            })
            .copied()
            .collect())
    }

    async fn read_state(
        &self,
        program_id: &Pubkey,
        _origin: &Pubkey,
        payload: &[u8],
    ) -> std::result::Result<Vec<u8>, ConnectionError> {
        let state = self.state.lock().await;
        let program = *state
            .programs
            .get(program_id)
            .ok_or_else(|| format!("program {program_id} not found"))?;
        Ok(state.query(program, payload)?)
    }

    async fn calculate_gas(
        &self,
        _origin: &Pubkey,
        program_id: &Pubkey,
        _payload: &[u8],
        _value: u128,
    ) -> std::result::Result<u64, ConnectionError> {
        let state = self.state.lock().await;
        if !state.programs.contains_key(program_id) {
            return Err(format!("program {program_id} not found").into());
        }
        Ok(GAS_ESTIMATE)
    }

    async fn submit(&self, extrinsic: SignedExtrinsic) -> std::result::Result<StatusStream, ConnectionError> {
        if !extrinsic.verify() {
            return Err("bad signature".into());
        }

        let mut state = self.state.lock().await;
        let script = state.scripts.pop_front().unwrap_or(Script::Finalize);
        if script == Script::RejectBroadcast {
            return Err("connection reset by peer".into());
        }

        state.calls.push((extrinsic.signer, extrinsic.call.clone()));
        let (tx, rx) = unbounded_channel();
        let send = |status: TxStatus| {
            let _ = tx.send(status);
        };
        send(TxStatus::Ready);
        send(TxStatus::Broadcast);

        match script {
            Script::Drop => send(TxStatus::Dropped),
            Script::Invalid => send(TxStatus::Invalid("stale nonce".to_string())),
            Script::Stall => {
                send(TxStatus::InBlock(state.next_hash(b"block", &[])));
                state.stalled.push(tx);
            },
            Script::Finalize | Script::Reorg | Script::RejectBroadcast => {
                let events = match state.apply(extrinsic.signer, &extrinsic.call) {
                    Ok(events) => events,
                    Err(reason) => vec![ChainEvent::ExtrinsicFailed { reason }],
                };
                let block_hash = state.next_hash(b"block", &[]);
                if script == Script::Reorg {
                    let orphan = state.next_hash(b"block", &[]);
                    send(TxStatus::InBlock(orphan));
                    send(TxStatus::Retracted(orphan));
                }
                send(TxStatus::InBlock(block_hash));
                send(TxStatus::Finalized(FinalizedBlock { block_hash, events }));
            },
        }

        Ok(rx)
    }
}

pub struct SimulatedConnector {
    pub chain: Arc<SimulatedChain>,
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, endpoint: &str) -> std::result::Result<Arc<dyn ChainConnection>, ConnectionError> {
        if endpoint != ENDPOINT {
            return Err(format!("unreachable endpoint {endpoint}").into());
        }
        let chain: Arc<dyn ChainConnection> = self.chain.clone();
        Ok(chain)
    }
}

//=============================================================================
// Observers
//=============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<(Step, StepOutcome)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(Step, StepOutcome)> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Steps that finished, in order, with whether they succeeded
    pub fn finished(&self) -> Vec<(Step, bool)> {
        self.events()
            .into_iter()
            .filter_map(|(step, outcome)| match outcome {
                StepOutcome::Started => None,
                StepOutcome::Succeeded => Some((step, true)),
                StepOutcome::Failed(_) => Some((step, false)),
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_step(&self, step: Step, outcome: &StepOutcome) {
        if let Ok(mut events) = self.events.lock() {
            events.push((step, outcome.clone()));
        }
    }
}

//=============================================================================
// Test Context
//=============================================================================

pub struct TestContext {
    pub chain: Arc<SimulatedChain>,
    pub ctx: ChainContext,
    pub sponsor: Keypair,
    pub keyring_program: Pubkey,
    pub ping_program: Pubkey,
    pub observer: Arc<RecordingObserver>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config(keyring_program: &Pubkey, ping_program: &Pubkey) -> SdkConfig {
    let mut config = SdkConfig::new(ENDPOINT);
    config.submission.finalization_timeout_secs = 5;
    config.contracts = vec![
        ContractConfig {
            name: "Keyring".to_string(),
            program_id: keyring_program.to_string(),
            idl: Some(format!("{KEYRING_IDL}\n{PING_IDL}")),
            idl_path: None,
        },
        ContractConfig {
            name: "Ping".to_string(),
            program_id: format!("0x{}", hex_of(ping_program)),
            idl: Some(PING_IDL.to_string()),
            idl_path: None,
        },
    ];
    config
}

fn hex_of(key: &Pubkey) -> String {
    key.to_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut SdkConfig)) -> Result<Self> {
        init_tracing();

        let chain = Arc::new(SimulatedChain::new());
        let sponsor = Keypair::new();
        let keyring_program = Pubkey::new_unique();
        let ping_program = Pubkey::new_unique();

        chain.deploy_keyring(keyring_program).await;
        chain.deploy_ping(ping_program).await;
        chain.fund(&sponsor.pubkey(), SPONSOR_FUNDS).await;

        let mut config = test_config(&keyring_program, &ping_program);
        adjust(&mut config);

        let observer = Arc::new(RecordingObserver::default());
        let connector = SimulatedConnector {
            chain: chain.clone(),
        };
        let ctx = ChainContext::connect(config, &connector)
            .await?
            .with_observer(observer.clone());

        Ok(Self {
            chain,
            ctx,
            sponsor,
            keyring_program,
            ping_program,
            observer,
        })
    }

    /// Issue a voucher for `owner` on the ping program with the given amounts
    pub async fn issue_ping_voucher(&self, owner: &Pubkey, tokens: u64, blocks: BlockNumber) -> Result<VoucherId> {
        Ok(self
            .ctx
            .vouchers()
            .issue(&self.sponsor, owner, &[self.ping_program], tokens, blocks)
            .await?)
    }
}
