//! 進路意図（desire）クラス表
//!
//! `NavModelOutputDesirePrediction::values` の各スロットが表す意図クラス。
//! 構造体側では強制しない文書上の列挙で、欠番スロットもレイアウト互換の
//! ために出力配列上に残る。

use std::fmt;

/// desire 出力の次元数
pub const NAV_DESIRE_LEN: usize = 32;

/// ナビゲーション指示ベクトルの次元数
pub const NAV_INSTRUCTION_LEN: usize = 41;

/// 進路意図クラス（値は出力配列上のインデックス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Desire {
    Start = 1,
    Destination = 4,
    Continue = 8,
    SlightRight = 9,
    Right = 10,
    SharpRight = 11,
    UturnLeft = 13,
    SharpLeft = 14,
    Left = 15,
    SlightLeft = 16,
    RampStraight = 17,
    RampRight = 18,
    RampLeft = 19,
    ExitRight = 20,
    ExitLeft = 21,
    StayStraight = 22,
    StayRight = 23,
    StayLeft = 24,
    RoundaboutEnter = 26,
    RoundaboutExit = 27,
}

/// 未使用（予約）スロット
pub const RESERVED_DESIRE_INDICES: [usize; 12] = [0, 2, 3, 5, 6, 7, 12, 25, 28, 29, 30, 31];

impl Desire {
    /// 全クラス（インデックス昇順）
    pub const ALL: [Desire; 20] = [
        Desire::Start,
        Desire::Destination,
        Desire::Continue,
        Desire::SlightRight,
        Desire::Right,
        Desire::SharpRight,
        Desire::UturnLeft,
        Desire::SharpLeft,
        Desire::Left,
        Desire::SlightLeft,
        Desire::RampStraight,
        Desire::RampRight,
        Desire::RampLeft,
        Desire::ExitRight,
        Desire::ExitLeft,
        Desire::StayStraight,
        Desire::StayRight,
        Desire::StayLeft,
        Desire::RoundaboutEnter,
        Desire::RoundaboutExit,
    ];

    /// 出力配列上のインデックス
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// インデックスからクラスを得る（予約スロット・範囲外は `None`）
    pub fn from_index(index: usize) -> Option<Desire> {
        Desire::ALL.iter().copied().find(|d| d.index() == index)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Desire::Start => "start",
            Desire::Destination => "destination",
            Desire::Continue => "continue",
            Desire::SlightRight => "slightRight",
            Desire::Right => "right",
            Desire::SharpRight => "sharpRight",
            Desire::UturnLeft => "uturnLeft",
            Desire::SharpLeft => "sharpLeft",
            Desire::Left => "left",
            Desire::SlightLeft => "slightLeft",
            Desire::RampStraight => "rampStraight",
            Desire::RampRight => "rampRight",
            Desire::RampLeft => "rampLeft",
            Desire::ExitRight => "exitRight",
            Desire::ExitLeft => "exitLeft",
            Desire::StayStraight => "stayStraight",
            Desire::StayRight => "stayRight",
            Desire::StayLeft => "stayLeft",
            Desire::RoundaboutEnter => "roundaboutEnter",
            Desire::RoundaboutExit => "roundaboutExit",
        }
    }

    /// 名前からクラスを得る
    pub fn from_name(name: &str) -> Option<Desire> {
        Desire::ALL.iter().copied().find(|d| d.name() == name)
    }
}

impl fmt::Display for Desire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
