// Partner result codes are partitioned into bands of one hundred. The 9xx
// band is never sent by the partner; the adapter uses it for locally
// synthesized results when the transport or the response body is unusable.
pub const CODE_SUCCESS: u32 = 0;
pub const CODE_INVALID_HTTP_RESPONSE: u32 = 901;
pub const CODE_INVALID_RESPONSE_FORMAT: u32 = 902;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    PartnerAccountError,
    ClientError,
    OperatorOrEvseError,
    HubError,
    PaymentError,
    PartnerSystemError,
    Unknown,
}

pub fn classify(code: u32) -> Outcome {
    match code {
        0..=99 => Outcome::Success,
        100..=199 => Outcome::PartnerAccountError,
        200..=299 => Outcome::ClientError,
        300..=399 => Outcome::OperatorOrEvseError,
        400..=499 => Outcome::HubError,
        800..=899 => Outcome::PaymentError,
        900..=999 => Outcome::PartnerSystemError,
        _ => Outcome::Unknown,
    }
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    // Hub-side and locally synthesized transport failures are worth another
    // cycle; account, client, operator and payment rejections are not, and
    // neither is anything outside the documented bands.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::HubError | Self::PartnerSystemError)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CODE_INVALID_HTTP_RESPONSE, CODE_INVALID_RESPONSE_FORMAT, CODE_SUCCESS, Outcome, classify,
    };

    #[test]
    fn zero_classifies_as_success() {
        assert_eq!(classify(CODE_SUCCESS), Outcome::Success);
        assert!(classify(0).is_success());
    }

    #[test]
    fn bands_map_to_their_outcome() {
        assert_eq!(classify(11), Outcome::Success);
        assert_eq!(classify(140), Outcome::PartnerAccountError);
        assert_eq!(classify(200), Outcome::ClientError);
        assert_eq!(classify(310), Outcome::OperatorOrEvseError);
        assert_eq!(classify(403), Outcome::HubError);
        assert_eq!(classify(802), Outcome::PaymentError);
        assert_eq!(classify(CODE_INVALID_HTTP_RESPONSE), Outcome::PartnerSystemError);
        assert_eq!(
            classify(CODE_INVALID_RESPONSE_FORMAT),
            Outcome::PartnerSystemError
        );
    }

    #[test]
    fn codes_outside_every_band_classify_as_unknown_and_permanent() {
        for code in [500, 666, 700, 1_000, 99_999] {
            let outcome = classify(code);
            assert_eq!(outcome, Outcome::Unknown);
            assert!(!outcome.is_retryable());
        }
    }

    #[test]
    fn classification_is_deterministic_over_the_full_range() {
        for code in 0..2_000 {
            assert_eq!(classify(code), classify(code));
        }
    }

    #[test]
    fn only_hub_and_partner_system_errors_are_retryable() {
        assert!(Outcome::HubError.is_retryable());
        assert!(Outcome::PartnerSystemError.is_retryable());
        assert!(!Outcome::Success.is_retryable());
        assert!(!Outcome::PartnerAccountError.is_retryable());
        assert!(!Outcome::ClientError.is_retryable());
        assert!(!Outcome::OperatorOrEvseError.is_retryable());
        assert!(!Outcome::PaymentError.is_retryable());
    }
}
