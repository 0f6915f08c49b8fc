use crate::advanced::calls;
use crate::core::connection::ChainEvent;
use crate::core::constants::ZERO_ADDRESS;
use crate::core::context::{ChainContext, ContractBinding};
use crate::core::signer::VouchSigner;
use crate::error::{Result, VouchSdkError};
use crate::types::VoucherId;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;
use vouchkit_interface::{ContractInterface, MethodSchema};

/// Resolves `(service, method)` pairs of one bound contract into invocable
/// queries and commands.
pub struct ContractClient<'a> {
    ctx: &'a ChainContext,
    binding: &'a ContractBinding,
}

impl<'a> ContractClient<'a> {
    pub fn new(ctx: &'a ChainContext, binding: &'a ContractBinding) -> Self {
        Self { ctx, binding }
    }

    pub fn name(&self) -> &str {
        &self.binding.name
    }

    pub fn program_id(&self) -> Pubkey {
        self.binding.program_id
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.binding.interface
    }

    /// Fails with `ServiceNotFound` or `MethodNotFound` listing what exists.
    pub fn query(&self, service: &str, method: &str) -> Result<QueryBuilder<'a>> {
        let schema = self.binding.interface.resolve_query(service, method)?;
        Ok(QueryBuilder {
            ctx: self.ctx,
            program_id: self.binding.program_id,
            method: schema,
            origin: ZERO_ADDRESS,
            args: Vec::new(),
        })
    }

    /// Fails with `ServiceNotFound` or `MethodNotFound` listing what exists.
    pub fn command(&self, service: &str, method: &str) -> Result<CommandBuilder<'a>> {
        let schema = self.binding.interface.resolve_command(service, method)?;
        Ok(CommandBuilder {
            ctx: self.ctx,
            program_id: self.binding.program_id,
            method: schema,
            args: Vec::new(),
            signer: None,
            value: 0,
            gas_limit: None,
            voucher_id: None,
        })
    }
}

//=============================================================================
// Queries
//=============================================================================

pub struct QueryBuilder<'a> {
    ctx: &'a ChainContext,
    program_id: Pubkey,
    method: &'a MethodSchema,
    origin: Pubkey,
    args: Vec<u8>,
}

impl<'a> QueryBuilder<'a> {
    pub fn method(&self) -> &MethodSchema {
        self.method
    }

    /// Account the query is evaluated as. Defaults to the zero address.
    pub fn with_origin(mut self, origin: Pubkey) -> Self {
        self.origin = origin;
        self
    }

    /// Borsh-encode the positional arguments; pass a tuple for several.
    pub fn with_args<T: BorshSerialize>(mut self, args: &T) -> Result<Self> {
        self.args = borsh::to_vec(args)?;
        Ok(self)
    }

    pub fn with_raw_args(mut self, args: Vec<u8>) -> Self {
        self.args = args;
        self
    }

    /// Raw reply bytes with the route prefix removed
    pub async fn call(self) -> Result<Vec<u8>> {
        self.ctx.ensure_connected()?;

        let mut payload = self.method.route();
        payload.extend_from_slice(&self.args);

        let reply = self
            .ctx
            .connection()
            .read_state(&self.program_id, &self.origin, &payload)
            .await
            .map_err(VouchSdkError::connection)?;
        debug!(
            service = %self.method.service,
            method = %self.method.name,
            reply_len = reply.len(),
            "query answered"
        );

        Ok(strip_route(self.method, &reply)?.to_vec())
    }

    pub async fn call_decoded<T: BorshDeserialize>(self) -> Result<T> {
        let name = self.method.name.clone();
        let bytes = self.call().await?;
        borsh::from_slice(&bytes)
            .map_err(|e| VouchSdkError::InvalidReply(format!("{name}: {e}")))
    }
}

//=============================================================================
// Commands
//=============================================================================

/// Accumulates signer, value, gas and voucher, then submits and waits for
/// finalization.
pub struct CommandBuilder<'a> {
    ctx: &'a ChainContext,
    program_id: Pubkey,
    method: &'a MethodSchema,
    args: Vec<u8>,
    signer: Option<Arc<dyn VouchSigner>>,
    value: u128,
    gas_limit: Option<u64>,
    voucher_id: Option<VoucherId>,
}

impl<'a> CommandBuilder<'a> {
    pub fn method(&self) -> &MethodSchema {
        self.method
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn with_args<T: BorshSerialize>(mut self, args: &T) -> Result<Self> {
        self.args = borsh::to_vec(args)?;
        Ok(self)
    }

    pub fn with_raw_args(mut self, args: Vec<u8>) -> Self {
        self.args = args;
        self
    }

    pub fn with_account(mut self, signer: Arc<dyn VouchSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// Explicit gas limit; otherwise calculated by the node before sending
    pub fn with_gas(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Pay for the call from a voucher instead of the signer's balance
    pub fn with_voucher(mut self, voucher_id: VoucherId) -> Self {
        self.voucher_id = Some(voucher_id);
        self
    }

    pub async fn sign_and_send(self) -> Result<CommandReceipt> {
        self.ctx.ensure_connected()?;

        let signer = self.signer.ok_or_else(|| {
            VouchSdkError::SessionIncomplete(format!(
                "command {}/{} has no signing account",
                self.method.service, self.method.name
            ))
        })?;
        let origin = signer.address();

        let route = self.method.route();
        let mut payload = route.clone();
        payload.extend_from_slice(&self.args);

        let gas_limit = match self.gas_limit {
            Some(gas) => gas,
            None => self
                .ctx
                .connection()
                .calculate_gas(&origin, &self.program_id, &payload, self.value)
                .await
                .map_err(VouchSdkError::connection)?,
        };

        let call = calls::send_message(&self.program_id, payload, gas_limit, self.value, self.voucher_id);
        let tx = self.ctx.submitter().sign_and_submit(call, signer.as_ref()).await?;

        let message_id = tx
            .events
            .iter()
            .find_map(|event| match event {
                ChainEvent::MessageQueued {
                    message_id,
                    source,
                    destination,
                } if *source == origin && *destination == self.program_id => Some(*message_id),
                _ => None,
            })
            .ok_or_else(|| {
                VouchSdkError::SubmissionFailure(format!(
                    "message to {} was not queued in block {}",
                    self.program_id, tx.block_hash
                ))
            })?;

        let reply = tx.events.iter().find_map(|event| match event {
            ChainEvent::Reply { reply_to, payload } if *reply_to == message_id => {
                Some(payload.clone())
            },
            _ => None,
        });

        debug!(
            service = %self.method.service,
            method = %self.method.name,
            %message_id,
            sponsored = self.voucher_id.is_some(),
            gas_limit,
            "command finalized"
        );

        Ok(CommandReceipt {
            message_id,
            tx_hash: tx.tx_hash,
            block_hash: tx.block_hash,
            route,
            reply,
        })
    }
}

/// Result of a finalized command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReceipt {
    pub message_id: Hash,
    pub tx_hash: Hash,
    pub block_hash: Hash,
    route: Vec<u8>,
    /// Raw reply, including its route prefix
    pub reply: Option<Vec<u8>>,
}

impl CommandReceipt {
    pub fn decode_reply<T: BorshDeserialize>(&self) -> Result<T> {
        let reply = self.reply.as_deref().ok_or_else(|| {
            VouchSdkError::InvalidReply(format!("message {} produced no reply", self.message_id))
        })?;
        let body = reply.strip_prefix(self.route.as_slice()).ok_or_else(|| {
            VouchSdkError::InvalidReply(format!("reply to {} has a foreign route", self.message_id))
        })?;
        borsh::from_slice(body).map_err(|e| VouchSdkError::InvalidReply(e.to_string()))
    }
}

fn strip_route<'r>(method: &MethodSchema, reply: &'r [u8]) -> Result<&'r [u8]> {
    reply.strip_prefix(method.route().as_slice()).ok_or_else(|| {
        VouchSdkError::InvalidReply(format!(
            "reply is not routed to {}/{}",
            method.service, method.name
        ))
    })
}
