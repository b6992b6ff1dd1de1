//! Canned responses registered for documentation examples.
//!
//! Service paths are resolved against the client's base URL; the cloud
//! metadata endpoints use their fixed link-local address.

use serde_json::{Value, json};
use time::OffsetDateTime;
use time::macros::format_description;
use url::Url;

use crate::client::Method;
use crate::ldap::directory;
use crate::stubs::{StubRegistry, StubResponse};

use super::DoctestError;

/// Mount that the userpass MFA examples use.
pub const USERPASS_MOUNT: &str = "some-userpass";
/// AWS role with canned credentials.
pub const AWS_ROLE: &str = "hvac-role";
/// Azure role with canned credentials.
pub const AZURE_ROLE: &str = "hvac";
/// Instance role served by the EC2 metadata stub.
pub const EC2_INSTANCE_ROLE: &str = "some-instance-role";

const METADATA_BASE: &str = "http://169.254.169.254/latest";

/// Login paths under `/v1/auth/` that answer with the root credential.
#[must_use]
pub fn auth_login_paths() -> Vec<String> {
    vec![
        String::from("azure/login"),
        String::from("kubernetes/login"),
        String::from("gcp/login"),
        String::from("github/login"),
        format!("ldap/login/{}", directory::USER_NAME),
        format!("{USERPASS_MOUNT}/login/someuser"),
        String::from("okta/login"),
        String::from("okta/login/hvac-person"),
    ]
}

/// Registers the full catalogue.
pub(crate) fn register(
    stubs: &StubRegistry,
    base: &Url,
    root_token: &str,
    now: OffsetDateTime,
) -> Result<(), DoctestError> {
    let service = |path: &str| -> Result<Url, DoctestError> {
        base.join(path).map_err(|source| DoctestError::StubUrl {
            path: path.to_owned(),
            source,
        })
    };

    stubs.register_url(
        Method::Post,
        &service("v1/auth/aws/login")?,
        StubResponse::json(aws_login(root_token)),
    );

    stubs.register(
        Method::Get,
        &format!("{METADATA_BASE}/meta-data/iam/security-credentials/{EC2_INSTANCE_ROLE}"),
        StubResponse::json(ec2_credentials(now)?),
    )?;
    stubs.register(
        Method::Get,
        &format!("{METADATA_BASE}/dynamic/instance-identity/pkcs7"),
        StubResponse::json(json!("some_pkcs7_string")),
    )?;

    for path in auth_login_paths() {
        stubs.register_url(
            Method::Post,
            &service(&format!("v1/auth/{path}"))?,
            StubResponse::json(auth_login(root_token)),
        );
    }
    stubs.register_url(
        Method::Post,
        &service(&format!("v1/auth/{USERPASS_MOUNT}/duo/access"))?,
        StubResponse::empty(),
    );

    stubs.register_url(
        Method::Post,
        &service("v1/aws/config/rotate-root")?,
        StubResponse::json(json!({"data": {"access_key": "AKIA..."}})),
    );
    stubs.register_url(
        Method::Get,
        &service(&format!("v1/aws/creds/{AWS_ROLE}"))?,
        StubResponse::json(json!({
            "data": {
                "access_key": "AKIA...",
                "secret_key": "xlCs...",
                "security_token": null,
            }
        })),
    );

    stubs.register_url(
        Method::Post,
        &service(&format!("v1/azure/roles/{AZURE_ROLE}"))?,
        StubResponse::empty(),
    );
    stubs.register_url(
        Method::List,
        &service("v1/azure/roles")?,
        StubResponse::json(json!({"data": {"keys": [AZURE_ROLE]}})),
    );
    stubs.register_url(
        Method::Get,
        &service(&format!("v1/azure/creds/{AZURE_ROLE}"))?,
        StubResponse::json(json!({
            "data": {
                "client_id": "some_client_id",
                "client_secret": "some_client_secret",
            }
        })),
    );
    Ok(())
}

fn aws_login(root_token: &str) -> Value {
    json!({
        "auth": {
            "accessor": "accessor-1234-5678-9012-345678901234",
            "client_token": root_token,
            "lease_duration": 10000,
            "metadata": {
                "role": "custom_role",
                "service_account_email": "dev1@project-123456.iam.gserviceaccount.com",
                "service_account_id": "111111111111111111111",
            },
            "policies": ["default", "custom_role"],
            "renewable": true,
        },
        "data": null,
        "lease_duration": 0,
        "lease_id": "",
        "renewable": false,
        "request_id": "requesti-1234-5678-9012-345678901234",
        "warnings": [],
        "wrap_info": null,
    })
}

fn auth_login(root_token: &str) -> Value {
    json!({
        "auth": {
            "client_token": root_token,
            "accessor": "0e9e354a-520f-df04-6867-ee81cae3d42d",
            "policies": ["default"],
            "lease_duration": 2_764_800,
            "renewable": true,
        }
    })
}

/// Instance credentials valid from four hours ago until four hours from now.
fn ec2_credentials(now: OffsetDateTime) -> Result<Value, DoctestError> {
    let window = time::Duration::hours(4);
    let stamp = |at: OffsetDateTime| {
        let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
        at.format(format)
            .map_err(|source| DoctestError::Timestamp { source })
    };
    Ok(json!({
        "Code": "Success",
        "LastUpdated": stamp(now - window)?,
        "Type": "AWS-HMAC",
        "AccessKeyId": "foobar_key",
        "SecretAccessKey": "foobar_secret",
        "Token": "foobar_token",
        "Expiration": stamp(now + window)?,
    }))
}
