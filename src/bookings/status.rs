use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    #[serde(rename = "Waiting for Work")]
    WaitingForWork,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
    #[serde(rename = "Payment Failed")]
    PaymentFailed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::WaitingForWork,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::PaymentFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        use BookingStatus::*;
        match self {
            Pending => "Pending",
            WaitingForWork => "Waiting for Work",
            InProgress => "In Progress",
            Completed => "Completed",
            Cancelled => "Cancelled",
            PaymentFailed => "Payment Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::PaymentFailed)
    }

    /// Edges of the lifecycle graph, regardless of who drives them.
    pub fn can_advance_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, WaitingForWork | PaymentFailed | Cancelled)
                | (WaitingForWork, InProgress | Cancelled)
                | (InProgress, Completed | Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BookingError::Validation(format!("unknown booking status {s:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(alias = "mpesa")]
    MobileMoney,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_money" | "mpesa" => Ok(PaymentMethod::MobileMoney),
            "cash" => Ok(PaymentMethod::Cash),
            _ => Err(BookingError::Validation(format!("unknown payment method {s:?}"))),
        }
    }
}

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Provider,
    Payment,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Actor::Customer => "customer",
            Actor::Provider => "provider",
            Actor::Payment => "payment",
        })
    }
}

/// The `(status, paid)` pair a booking moves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: BookingStatus,
    pub paid: bool,
}

/// Decides whether `actor` may move a booking from `(current, paid)` to `next`,
/// and what the paid flag becomes. The result always satisfies [`check_invariant`].
pub fn plan(
    method: PaymentMethod,
    current: BookingStatus,
    paid: bool,
    actor: Actor,
    next: BookingStatus,
) -> Result<Transition, BookingError> {
    use BookingStatus::*;

    let refuse = || BookingError::NotAllowed { actor, from: current, to: next };

    if current.is_terminal() || !current.can_advance_to(next) {
        return Err(BookingError::InvalidTransition { from: current, to: next });
    }

    let paid = match (actor, current, next) {
        (Actor::Payment, Pending, WaitingForWork) if method == PaymentMethod::MobileMoney => true,
        (Actor::Payment, Pending, PaymentFailed) if method == PaymentMethod::MobileMoney => false,
        (Actor::Payment, _, _) => return Err(refuse()),

        (Actor::Provider, Pending, WaitingForWork) if method == PaymentMethod::Cash => false,
        (Actor::Provider, WaitingForWork, InProgress) => paid,
        (Actor::Provider, InProgress, Completed) => match method {
            PaymentMethod::Cash => true,
            PaymentMethod::MobileMoney => paid,
        },
        (Actor::Provider, _, Cancelled) => false,
        (Actor::Provider, _, _) => return Err(refuse()),

        (Actor::Customer, Pending, Cancelled) => false,
        (Actor::Customer, _, _) => return Err(refuse()),
    };

    check_invariant(method, next, paid)?;
    Ok(Transition { status: next, paid })
}

/// Consistency rules between payment method, status and the paid flag.
pub fn check_invariant(method: PaymentMethod, status: BookingStatus, paid: bool) -> Result<(), BookingError> {
    use BookingStatus::*;

    let broken = |why: &str| Err(BookingError::Invariant(format!("{method} booking {status} with paid={paid}: {why}")));

    if paid && !matches!(status, WaitingForWork | InProgress | Completed) {
        return broken("only confirmed work can be paid");
    }
    match method {
        PaymentMethod::MobileMoney => {
            if !paid && matches!(status, WaitingForWork | InProgress | Completed) {
                return broken("mobile-money work starts only after payment");
            }
        }
        PaymentMethod::Cash => {
            if status == PaymentFailed {
                return broken("cash bookings have no payment to fail");
            }
            if paid && status != Completed {
                return broken("cash is collected on completion");
            }
        }
    }
    Ok(())
}
