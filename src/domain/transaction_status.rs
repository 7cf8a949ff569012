//! 交易状态机
//! Built → Signed → Submitted → {Confirmed | AlreadyKnown | Rejected}

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// 已构建，等待签名
    Built,

    /// 已签名，等待提交
    Signed,

    /// 已提交到节点
    Submitted,

    /// 节点已出块并给出回执
    Confirmed,

    /// 节点报告该交易此前已接收，按成功处理
    AlreadyKnown,

    /// 节点明确拒绝
    Rejected,
}

impl TransactionState {
    /// 获取状态描述
    pub fn description(&self) -> &'static str {
        match self {
            Self::Built => "交易已构建",
            Self::Signed => "交易已签名",
            Self::Submitted => "交易已提交",
            Self::Confirmed => "交易已确认",
            Self::AlreadyKnown => "交易已存在于节点",
            Self::Rejected => "交易被拒绝",
        }
    }

    /// 是否为最终状态（不可再转换）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::AlreadyKnown | Self::Rejected)
    }

    /// 提交结果是否视为成功
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Submitted | Self::Confirmed | Self::AlreadyKnown)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionState::*;

        matches!(
            (self, target),
            (Built, Signed)
                | (Signed, Submitted)
                | (Submitted, Confirmed)
                | (Submitted, AlreadyKnown)
                | (Submitted, Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::AlreadyKnown => "already_known",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
