//! Turns a requested financial action into an ordered operation sequence

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tx_pipeline_types::PipelineError;

use super::gas::{ActionKind, GasKey, GasLimitTable};
use super::types::{CompletionCallback, ContractCall, Operation, permit_handler, validate_sequence};
use crate::contracts::{
    APPROVE_AND_CALL, ContractRegistry, PROVIDE_TO_SP, PROVIDE_TO_SP_FROM_DLLR, STAKE_WITH_APPROVAL,
    SupportedToken, TokenClass, TokenInfo, WITHDRAW_FROM_SP, WITHDRAW_FROM_SP_AND_CONVERT_TO_DLLR,
};
use crate::domain_types::FixedDecimal;
use crate::permit::{PermitPreparer, PermitSignature};

/// Argument slot of `provideToSpFromDLLR` that carries the permit
const PERMIT_ARG_INDEX: usize = 1;

/// Lock parameters for staking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeParams {
    /// Unix timestamp the stake is locked until
    pub until: u64,
    /// Defaults to the staker
    pub delegatee: Option<Address>,
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialAction {
    pub kind: ActionKind,
    pub token: SupportedToken,
    pub amount: FixedDecimal,
    #[serde(default)]
    pub has_rewards_to_claim: bool,
    #[serde(default)]
    pub stake: Option<StakeParams>,
}

impl FinancialAction {
    pub fn stability_deposit(token: SupportedToken, amount: FixedDecimal) -> Self {
        Self {
            kind: ActionKind::StabilityDeposit,
            token,
            amount,
            has_rewards_to_claim: false,
            stake: None,
        }
    }

    pub fn stability_withdraw(
        token: SupportedToken,
        amount: FixedDecimal,
        has_rewards_to_claim: bool,
    ) -> Self {
        Self {
            kind: ActionKind::StabilityWithdraw,
            token,
            amount,
            has_rewards_to_claim,
            stake: None,
        }
    }

    pub fn stake(amount: FixedDecimal, params: StakeParams) -> Self {
        Self {
            kind: ActionKind::Stake,
            token: SupportedToken::Sov,
            amount,
            has_rewards_to_claim: false,
            stake: Some(params),
        }
    }

    /// Title shown above the step list
    pub fn dialog_title(&self) -> String {
        match self.kind {
            ActionKind::StabilityDeposit => format!("Deposit {} to Stability Pool", self.token),
            ActionKind::StabilityWithdraw => format!("Withdraw {} from Stability Pool", self.token),
            ActionKind::Stake => format!("Stake {}", self.token),
        }
    }
}

pub struct PipelineBuilder {
    registry: ContractRegistry,
    gas_limits: GasLimitTable,
    preparer: PermitPreparer,
}

impl PipelineBuilder {
    pub fn new(registry: ContractRegistry, preparer: PermitPreparer) -> Self {
        Self {
            registry,
            gas_limits: GasLimitTable::default(),
            preparer,
        }
    }

    pub fn with_gas_limits(mut self, gas_limits: GasLimitTable) -> Self {
        self.gas_limits = gas_limits;
        self
    }

    /// Compose the operations for `action`. Only the permit nonce lookup
    /// touches the network; nothing is executed.
    pub async fn build(
        &self,
        action: &FinancialAction,
        signer: Address,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Vec<Operation>, PipelineError> {
        if action.amount.is_zero() {
            return Err(invalid_amount(action, "amount must be positive"));
        }

        let token = self.registry.token(action.token);
        if action.kind == ActionKind::Stake && token.token != SupportedToken::Sov {
            return Err(PipelineError::BuilderMisconfiguration {
                reason: format!("staking is only supported for SOV, not {}", token.symbol()),
            });
        }

        let wei = action
            .amount
            .to_wei(token.decimals)
            .map_err(|reason| invalid_amount(action, reason))?;
        if wei.is_zero() {
            return Err(invalid_amount(
                action,
                format!("below the smallest unit of {}", token.symbol()),
            ));
        }

        let key = GasKey::new(action.kind, token.class(), action.has_rewards_to_claim);
        let gas_limit = self.gas_limits.lookup(key);
        debug_assert!(gas_limit.is_ok(), "no gas limit for {:?}", key);
        let gas_limit = gas_limit?;

        let mut operations = match action.kind {
            ActionKind::StabilityDeposit => {
                self.stability_deposit(action, token, signer, wei, gas_limit)
                    .await?
            }
            ActionKind::StabilityWithdraw => {
                vec![self.stability_withdraw(action, token, wei, gas_limit)?]
            }
            ActionKind::Stake => vec![self.stake(action, token, signer, wei, gas_limit)?],
        };

        if let Some(callback) = on_complete {
            if let Some(last) = operations.last_mut() {
                last.on_complete = Some(callback);
            }
        }

        debug_assert!(validate_sequence(&operations).is_ok());
        validate_sequence(&operations)?;

        log::debug!(
            "[TxPipeline] Built {} operation(s) for {} {} {}",
            operations.len(),
            action.kind,
            action.amount,
            action.token
        );
        Ok(operations)
    }

    async fn stability_deposit(
        &self,
        action: &FinancialAction,
        token: &TokenInfo,
        signer: Address,
        wei: U256,
        gas_limit: u64,
    ) -> Result<Vec<Operation>, PipelineError> {
        let pool = require_address("stability pool", self.registry.stability_pool)?;
        let title = format!("Deposit {}", action.token);

        match token.class() {
            TokenClass::Permit => {
                require_address(token.symbol(), token.address)?;
                let permit = self
                    .preparer
                    .prepare(token, signer, pool, wei)
                    .await
                    .map_err(|reason| PipelineError::TransportError { index: 0, reason })?;

                let call = ContractCall {
                    contract: pool,
                    contract_name: "StabilityPool".to_string(),
                    function: PROVIDE_TO_SP_FROM_DLLR.clone(),
                    args: vec![Token::Uint(wei), PermitSignature::unsigned().to_token()],
                    gas_limit,
                };
                let deposit = Operation::contract_call(title, call).with_update_handler(
                    permit_handler(|mut request, permit| {
                        if let Some(call) = request.as_contract_call_mut() {
                            if let Some(slot) = call.args.get_mut(PERMIT_ARG_INDEX) {
                                *slot = permit.to_token();
                            }
                        }
                        request
                    }),
                );
                Ok(vec![permit, deposit])
            }
            TokenClass::Standard => {
                let call = ContractCall {
                    contract: pool,
                    contract_name: "StabilityPool".to_string(),
                    function: PROVIDE_TO_SP.clone(),
                    args: vec![Token::Uint(wei), Token::Address(Address::zero())],
                    gas_limit,
                };
                Ok(vec![Operation::contract_call(title, call)])
            }
        }
    }

    fn stability_withdraw(
        &self,
        action: &FinancialAction,
        token: &TokenInfo,
        wei: U256,
        gas_limit: u64,
    ) -> Result<Operation, PipelineError> {
        let pool = require_address("stability pool", self.registry.stability_pool)?;
        let function = match token.token {
            SupportedToken::Dllr => WITHDRAW_FROM_SP_AND_CONVERT_TO_DLLR.clone(),
            _ => WITHDRAW_FROM_SP.clone(),
        };
        let call = ContractCall {
            contract: pool,
            contract_name: "StabilityPool".to_string(),
            function,
            args: vec![Token::Uint(wei)],
            gas_limit,
        };
        Ok(Operation::contract_call(
            format!("Withdraw {}", action.token),
            call,
        ))
    }

    fn stake(
        &self,
        action: &FinancialAction,
        token: &TokenInfo,
        signer: Address,
        wei: U256,
        gas_limit: u64,
    ) -> Result<Operation, PipelineError> {
        let params = action
            .stake
            .ok_or_else(|| PipelineError::BuilderMisconfiguration {
                reason: "stake action without lock parameters".to_string(),
            })?;
        let staking = require_address("staking", self.registry.staking)?;
        let sov = require_address("SOV token", token.address)?;

        if wei > (U256::one() << 96) - U256::one() {
            return Err(invalid_amount(action, "stake amount exceeds uint96"));
        }

        let inner = STAKE_WITH_APPROVAL
            .encode_input(&[
                Token::Address(signer),
                Token::Uint(wei),
                Token::Uint(U256::from(params.until)),
                Token::Address(signer),
                Token::Address(params.delegatee.unwrap_or(signer)),
            ])
            .map_err(|e| PipelineError::BuilderMisconfiguration {
                reason: format!("stakeWithApproval encoding: {}", e),
            })?;

        let call = ContractCall {
            contract: sov,
            contract_name: "SOV".to_string(),
            function: APPROVE_AND_CALL.clone(),
            args: vec![Token::Address(staking), Token::Uint(wei), Token::Bytes(inner)],
            gas_limit,
        };
        Ok(Operation::contract_call(format!("Stake {}", action.token), call))
    }
}

fn require_address(name: &str, address: Address) -> Result<Address, PipelineError> {
    if address.is_zero() {
        log::error!("[TxPipeline] No {} address configured", name);
        return Err(PipelineError::BuilderMisconfiguration {
            reason: format!("{} address is not configured", name),
        });
    }
    Ok(address)
}

fn invalid_amount(action: &FinancialAction, reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidAmount {
        amount: action.amount.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ContractAddresses};
    use crate::permit::PermitNonceSource;
    use crate::pipeline::{OperationRequest, StepOutput};
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::Arc;
    use tx_pipeline_types::OperationKind;

    struct ZeroNonce;

    /// Fails every nonce read, so a build that reaches the chain shows up as a transport error
    struct OfflineNonce;

    #[async_trait]
    impl PermitNonceSource for OfflineNonce {
        async fn permit_nonce(&self, _token: Address, _owner: Address) -> Result<U256, String> {
            Err("nonce read attempted".to_string())
        }
    }

    #[async_trait]
    impl PermitNonceSource for ZeroNonce {
        async fn permit_nonce(&self, _token: Address, _owner: Address) -> Result<U256, String> {
            Ok(U256::zero())
        }
    }

    fn config() -> Config {
        Config {
            contracts: ContractAddresses {
                stability_pool: Address::repeat_byte(0x51),
                staking: Address::repeat_byte(0x52),
                dllr: Address::repeat_byte(0xd1),
                zusd: Address::repeat_byte(0x21),
                sov: Address::repeat_byte(0x50),
            },
            ..Config::default()
        }
    }

    fn builder(config: &Config) -> PipelineBuilder {
        PipelineBuilder::new(
            ContractRegistry::from_config(config),
            PermitPreparer::new(Arc::new(ZeroNonce), config.chain_id),
        )
    }

    fn amount(value: &str) -> FixedDecimal {
        FixedDecimal::from_str(value).unwrap()
    }

    fn contract_call(operation: &Operation) -> &ContractCall {
        match &operation.request {
            OperationRequest::ContractCall(call) => call,
            other => panic!("expected contract call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permit_token_deposit_prepends_permit() {
        let config = config();
        let signer = Address::repeat_byte(0x01);
        let ops = builder(&config)
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Dllr, amount("1.5")),
                signer,
                None,
            )
            .await
            .unwrap();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].kind(), OperationKind::SignPermit);
        assert_eq!(ops[1].kind(), OperationKind::ContractCall);

        let call = contract_call(&ops[1]);
        assert_eq!(call.function.name, "provideToSpFromDLLR");
        assert_eq!(call.gas_limit, 650_000);
        assert_eq!(call.args[0], Token::Uint(U256::from(1_500_000_000_000_000_000u64)));
        assert_eq!(call.args[1], PermitSignature::unsigned().to_token());
    }

    #[tokio::test]
    async fn test_update_handler_injects_permit() {
        let config = config();
        let ops = builder(&config)
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Dllr, amount("2")),
                Address::repeat_byte(0x01),
                None,
            )
            .await
            .unwrap();

        let signed = PermitSignature {
            deadline: U256::from(99u64),
            v: 27,
            r: ethers::types::H256::repeat_byte(0xaa),
            s: ethers::types::H256::repeat_byte(0xbb),
        };
        let resolved = ops[1].resolve(Some(&StepOutput::Permit(signed)));
        match resolved {
            OperationRequest::ContractCall(call) => {
                assert_eq!(call.args[1], signed.to_token());
                assert!(call.calldata().is_ok());
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_standard_token_deposit_uses_zero_authorization() {
        let config = config();
        let ops = builder(&config)
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Zusd, amount("10")),
                Address::repeat_byte(0x01),
                None,
            )
            .await
            .unwrap();

        assert_eq!(ops.len(), 1);
        let call = contract_call(&ops[0]);
        assert_eq!(call.function.name, "provideToSP");
        assert_eq!(call.args[1], Token::Address(Address::zero()));
        assert_eq!(call.gas_limit, 500_000);
        assert!(ops[0].update_handler.is_none());
    }

    #[tokio::test]
    async fn test_withdraw_picks_function_and_gas() {
        let config = config();
        let builder = builder(&config);
        let signer = Address::repeat_byte(0x01);

        let dllr = builder
            .build(
                &FinancialAction::stability_withdraw(SupportedToken::Dllr, amount("1"), true),
                signer,
                None,
            )
            .await
            .unwrap();
        let call = contract_call(&dllr[0]);
        assert_eq!(call.function.name, "withdrawFromSpAndConvertToDLLR");
        assert_eq!(call.gas_limit, 800_000);

        let zusd = builder
            .build(
                &FinancialAction::stability_withdraw(SupportedToken::Zusd, amount("1"), false),
                signer,
                None,
            )
            .await
            .unwrap();
        let call = contract_call(&zusd[0]);
        assert_eq!(call.function.name, "withdrawFromSP");
        assert_eq!(call.gas_limit, 500_000);
    }

    #[tokio::test]
    async fn test_stake_wraps_stake_with_approval() {
        let config = config();
        let signer = Address::repeat_byte(0x01);
        let ops = builder(&config)
            .build(
                &FinancialAction::stake(
                    amount("100"),
                    StakeParams {
                        until: 1_900_000_000,
                        delegatee: None,
                    },
                ),
                signer,
                None,
            )
            .await
            .unwrap();

        let call = contract_call(&ops[0]);
        assert_eq!(call.contract, config.contracts.sov);
        assert_eq!(call.function.name, "approveAndCall");
        assert_eq!(call.args[0], Token::Address(config.contracts.staking));
        match &call.args[2] {
            Token::Bytes(data) => {
                assert_eq!(&data[0..4], &STAKE_WITH_APPROVAL.short_signature());
                assert_eq!(data.len(), 4 + 5 * 32);
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_on_complete_attached_to_last_operation() {
        let config = config();
        let callback: CompletionCallback = Arc::new(|_: &StepOutput| {});
        let ops = builder(&config)
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Dllr, amount("1")),
                Address::repeat_byte(0x01),
                Some(callback),
            )
            .await
            .unwrap();
        assert!(ops[0].on_complete.is_none());
        assert!(ops[1].on_complete.is_some());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let config = config();
        let builder = builder(&config);
        let signer = Address::repeat_byte(0x01);

        let err = builder
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Zusd, FixedDecimal::zero()),
                signer,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidAmount { .. }));

        let mut stake_dllr = FinancialAction::stake(
            amount("1"),
            StakeParams {
                until: 1,
                delegatee: None,
            },
        );
        stake_dllr.token = SupportedToken::Dllr;
        let err = builder.build(&stake_dllr, signer, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::BuilderMisconfiguration { .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_pool_is_misconfiguration() {
        let unconfigured = Config::default();
        let err = builder(&unconfigured)
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Zusd, amount("1")),
                Address::repeat_byte(0x01),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BuilderMisconfiguration { .. }));

        // Pool configured but no DLLR address: no nonce read, no permit for 0x0
        let mut config = config();
        config.contracts.dllr = Address::zero();
        let builder = PipelineBuilder::new(
            ContractRegistry::from_config(&config),
            PermitPreparer::new(Arc::new(OfflineNonce), config.chain_id),
        );
        let err = builder
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Dllr, amount("1")),
                Address::repeat_byte(0x01),
                None,
            )
            .await
            .unwrap_err();
        match err {
            PipelineError::BuilderMisconfiguration { reason } => assert!(reason.contains("DLLR")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_amount_errors() {
        let config = config();
        let builder = builder(&config);
        let signer = Address::repeat_byte(0x01);

        let too_much = FinancialAction::stake(
            amount("79228162515"),
            StakeParams {
                until: 1,
                delegatee: None,
            },
        );
        let err = builder.build(&too_much, signer, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidAmount { .. }), "{:?}", err);

        let ops = builder
            .build(
                &FinancialAction::stability_withdraw(
                    SupportedToken::Zusd,
                    amount("100000000000.000000000000000001"),
                    false,
                ),
                signer,
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            contract_call(&ops[0]).args[0],
            Token::Uint(U256::from_dec_str("100000000000000000000000000001").unwrap())
        );
    }

    #[cfg(debug_assertions)]
    #[tokio::test]
    #[should_panic(expected = "no gas limit")]
    async fn test_missing_gas_limit_asserts_in_debug() {
        let config = config();
        let _ = builder(&config)
            .with_gas_limits(GasLimitTable::empty())
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Zusd, amount("1")),
                Address::repeat_byte(0x01),
                None,
            )
            .await;
    }

    #[cfg(not(debug_assertions))]
    #[tokio::test]
    async fn test_missing_gas_limit_is_misconfiguration() {
        let config = config();
        let err = builder(&config)
            .with_gas_limits(GasLimitTable::empty())
            .build(
                &FinancialAction::stability_deposit(SupportedToken::Zusd, amount("1")),
                Address::repeat_byte(0x01),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BuilderMisconfiguration { .. }));
    }

    #[test]
    fn test_dialog_title() {
        let action = FinancialAction::stability_withdraw(SupportedToken::Zusd, amount("1"), false);
        assert_eq!(action.dialog_title(), "Withdraw ZUSD from Stability Pool");
    }
}
