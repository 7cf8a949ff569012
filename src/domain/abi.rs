//! 标准代币接口的 ABI 编解码
//!
//! 只支持六个固定操作，参数与返回值用封闭的 `AbiValue` 表示；
//! 字节布局交给 `ethers::abi`

use std::{fmt, str::FromStr};

use ethers::{
    abi::{self, ParamType, Token},
    types::{Address, U256},
    utils::keccak256,
};

use crate::{
    error::{EngineError, Result},
    utils::units,
};

const WORD: usize = 32;

/// 支持的 ABI 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint(u16),
    String,
    Bool,
}

impl AbiType {
    pub fn param_type(&self) -> ParamType {
        match self {
            AbiType::Address => ParamType::Address,
            AbiType::Uint(bits) => ParamType::Uint(*bits as usize),
            AbiType::String => ParamType::String,
            AbiType::Bool => ParamType::Bool,
        }
    }

    // 字符串按 bytes 解码，UTF-8 由本模块校验
    fn decode_param_type(&self) -> ParamType {
        match self {
            AbiType::String => ParamType::Bytes,
            other => other.param_type(),
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.param_type())
    }
}

/// ABI 值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint { bits: u16, value: U256 },
    String(String),
    Bool(bool),
}

impl AbiValue {
    pub fn uint256(value: U256) -> Self {
        AbiValue::Uint { bits: 256, value }
    }

    pub fn abi_type(&self) -> AbiType {
        match self {
            AbiValue::Address(_) => AbiType::Address,
            AbiValue::Uint { bits, .. } => AbiType::Uint(*bits),
            AbiValue::String(_) => AbiType::String,
            AbiValue::Bool(_) => AbiType::Bool,
        }
    }

    fn to_token(&self) -> Result<Token> {
        Ok(match self {
            AbiValue::Address(address) => Token::Address(*address),
            AbiValue::Uint { bits, value } => {
                check_uint_width(*bits, *value).map_err(EngineError::InvalidArgument)?;
                Token::Uint(*value)
            }
            AbiValue::String(text) => Token::String(text.clone()),
            AbiValue::Bool(flag) => Token::Bool(*flag),
        })
    }

    fn from_token(token: Token, ty: AbiType) -> Result<Self> {
        match (ty, token) {
            (AbiType::Address, Token::Address(address)) => Ok(AbiValue::Address(address)),
            (AbiType::Uint(bits), Token::Uint(value)) => {
                check_uint_width(bits, value).map_err(EngineError::MalformedReturnData)?;
                Ok(AbiValue::Uint { bits, value })
            }
            (AbiType::Bool, Token::Bool(flag)) => Ok(AbiValue::Bool(flag)),
            (AbiType::String, Token::Bytes(bytes)) => String::from_utf8(bytes)
                .map(AbiValue::String)
                .map_err(|e| EngineError::MalformedReturnData(format!("invalid utf-8: {}", e))),
            (ty, token) => Err(EngineError::MalformedReturnData(format!(
                "expected {}, decoded {:?}",
                ty, token
            ))),
        }
    }
}

/// 合约调用返回值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCallResult {
    Uint(U256),
    Text(String),
    Bool(bool),
}

impl TokenCallResult {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            TokenCallResult::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TokenCallResult::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TokenCallResult::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// 标准代币接口的六个操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenFunction {
    BalanceOf,
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    Transfer,
}

impl TokenFunction {
    pub const ALL: [TokenFunction; 6] = [
        TokenFunction::BalanceOf,
        TokenFunction::Name,
        TokenFunction::Symbol,
        TokenFunction::Decimals,
        TokenFunction::TotalSupply,
        TokenFunction::Transfer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TokenFunction::BalanceOf => "balanceOf",
            TokenFunction::Name => "name",
            TokenFunction::Symbol => "symbol",
            TokenFunction::Decimals => "decimals",
            TokenFunction::TotalSupply => "totalSupply",
            TokenFunction::Transfer => "transfer",
        }
    }

    pub fn inputs(&self) -> &'static [AbiType] {
        match self {
            TokenFunction::BalanceOf => &[AbiType::Address],
            TokenFunction::Transfer => &[AbiType::Address, AbiType::Uint(256)],
            TokenFunction::Name
            | TokenFunction::Symbol
            | TokenFunction::Decimals
            | TokenFunction::TotalSupply => &[],
        }
    }

    pub fn outputs(&self) -> &'static [AbiType] {
        match self {
            TokenFunction::BalanceOf | TokenFunction::TotalSupply => &[AbiType::Uint(256)],
            TokenFunction::Name | TokenFunction::Symbol => &[AbiType::String],
            TokenFunction::Decimals => &[AbiType::Uint(8)],
            TokenFunction::Transfer => &[AbiType::Bool],
        }
    }

    /// 只读操作通过 `eth_call` 模拟执行
    pub fn is_read_only(&self) -> bool {
        !matches!(self, TokenFunction::Transfer)
    }

    /// 规范签名，如 `transfer(address,uint256)`
    pub fn signature(&self) -> String {
        let args = self
            .inputs()
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({})", self.name(), args)
    }

    /// keccak256(签名) 的前 4 字节
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }
}

impl FromStr for TokenFunction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        TokenFunction::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown function: {}", s)))
    }
}

/// 合约调用编解码器
pub struct ContractCallCodec;

impl ContractCallCodec {
    /// 编码调用数据：选择器 + ABI 参数
    pub fn encode(function: TokenFunction, args: &[AbiValue]) -> Result<Vec<u8>> {
        let inputs = function.inputs();
        if args.len() != inputs.len() {
            return Err(EngineError::InvalidArgument(format!(
                "{} expects {} argument(s), got {}",
                function.signature(),
                inputs.len(),
                args.len()
            )));
        }

        for (i, (arg, expected)) in args.iter().zip(inputs).enumerate() {
            if arg.abi_type() != *expected {
                return Err(EngineError::InvalidArgument(format!(
                    "{} argument {} must be {}, got {}",
                    function.signature(),
                    i,
                    expected,
                    arg.abi_type()
                )));
            }
        }

        let mut data = function.selector().to_vec();
        data.extend(Self::encode_arguments(args)?);
        Ok(data)
    }

    /// 按函数名编码
    pub fn encode_call(function_name: &str, args: &[AbiValue]) -> Result<Vec<u8>> {
        Self::encode(function_name.parse()?, args)
    }

    /// `transfer(to, amount)` 的调用数据
    pub fn transfer_data(to: Address, amount: U256) -> Result<Vec<u8>> {
        Self::encode(
            TokenFunction::Transfer,
            &[AbiValue::Address(to), AbiValue::uint256(amount)],
        )
    }

    /// 头部/尾部编码；动态类型在头部写偏移量
    pub fn encode_arguments(args: &[AbiValue]) -> Result<Vec<u8>> {
        let tokens = args
            .iter()
            .map(AbiValue::to_token)
            .collect::<Result<Vec<_>>>()?;
        Ok(abi::encode(&tokens))
    }

    /// 按期望类型解码返回数据
    pub fn decode(data: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>> {
        let head_size = types.len() * WORD;
        if data.len() < head_size || data.len() % WORD != 0 {
            return Err(EngineError::MalformedReturnData(format!(
                "{} bytes cannot hold {} word(s)",
                data.len(),
                types.len()
            )));
        }

        let params: Vec<ParamType> = types.iter().map(AbiType::decode_param_type).collect();
        let tokens = abi::decode(&params, data)
            .map_err(|e| EngineError::MalformedReturnData(e.to_string()))?;

        tokens
            .into_iter()
            .zip(types)
            .map(|(token, ty)| AbiValue::from_token(token, *ty))
            .collect()
    }

    /// 解码某个操作的单一返回值
    pub fn decode_output(function: TokenFunction, data: &[u8]) -> Result<TokenCallResult> {
        let mut values = Self::decode(data, function.outputs())?;
        match values.pop() {
            Some(AbiValue::Uint { value, .. }) => Ok(TokenCallResult::Uint(value)),
            Some(AbiValue::String(text)) => Ok(TokenCallResult::Text(text)),
            Some(AbiValue::Bool(flag)) => Ok(TokenCallResult::Bool(flag)),
            Some(AbiValue::Address(_)) | None => Err(EngineError::MalformedReturnData(format!(
                "{} has no scalar output",
                function.signature()
            ))),
        }
    }

    /// 最小单位 → 十进制字符串（截断到 18 位小数）
    pub fn to_decimal(raw: U256, decimals: u32) -> String {
        units::to_decimal(raw, decimals)
    }
}

fn check_uint_width(bits: u16, value: U256) -> std::result::Result<(), String> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(format!("unsupported uint width {}", bits));
    }
    if bits < 256 && !(value >> bits as usize).is_zero() {
        return Err(format!("value {} does not fit in uint{}", value, bits));
    }
    Ok(())
}
