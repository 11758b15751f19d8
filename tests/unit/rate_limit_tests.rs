use backend_lib::auth::AuthRateLimiter;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

#[test]
fn test_login_lockout_per_address() {
    let limiter = AuthRateLimiter::new(2, Duration::from_secs(60));
    let attacker = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
    let bystander = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2));

    limiter.record_failed_attempt(attacker);
    assert!(limiter.check_rate_limit(attacker));
    limiter.record_failed_attempt(attacker);
    assert!(!limiter.check_rate_limit(attacker));

    assert!(limiter.check_rate_limit(bystander));

    // success from elsewhere does not lift the lockout
    limiter.record_success(bystander);
    assert!(!limiter.check_rate_limit(attacker));
}
