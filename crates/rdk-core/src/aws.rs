//! `CloudProvider` backed by the `aws` command-line client.
//!
//! Every call runs `aws <service> <operation> ... --output json` as a blocking
//! subprocess and parses stdout with serde_json. Failures are classified from
//! the client's stderr line:
//!
//! ```text
//! An error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id x does not exist
//! ```
//!
//! # Binary resolution
//! 1. `RDK_AWS_CLI` environment variable
//! 2. `aws_cli` in `.rdk/config.yaml`
//! 3. `aws` on `PATH`

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::{Config, Session};
use crate::error::{RdkError, Result};
use crate::provider::{
    CloudProvider, Invocation, ProviderError, StackDescription, StackOutput, StackProbe,
    StackRequest, StackStatus, UpdateOutcome,
};
use crate::types::Frequency;

pub const AWS_CLI_ENV: &str = "RDK_AWS_CLI";

pub struct AwsCli {
    bin: PathBuf,
    session: Session,
}

impl AwsCli {
    pub fn new(session: Session, config: &Config) -> Result<Self> {
        let bin = match std::env::var_os(AWS_CLI_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => match &config.aws_cli {
                Some(p) => p.clone(),
                None => which::which("aws").map_err(|_| RdkError::AwsCliNotFound)?,
            },
        };
        Ok(Self::with_binary(bin, session))
    }

    pub fn with_binary(bin: PathBuf, session: Session) -> Self {
        Self { bin, session }
    }

    fn command(&self, service: &str, operation: &str) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args([service, operation, "--output", "json", "--region"]);
        cmd.arg(&self.session.region);
        if let Some(profile) = &self.session.profile {
            cmd.args(["--profile", profile]);
        }
        if let Some((key, secret)) = self.session.static_keys() {
            cmd.env("AWS_ACCESS_KEY_ID", key);
            cmd.env("AWS_SECRET_ACCESS_KEY", secret);
        }
        cmd.env("AWS_PAGER", "");
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run one operation and return its stdout.
    fn call(&self, service: &str, operation: &str, args: &[&str]) -> Result<String> {
        let mut cmd = self.command(service, operation);
        cmd.args(args);
        tracing::debug!(service, operation, "aws call");

        let output = cmd.output().map_err(|e| {
            ProviderError::new("SpawnFailed", operation, format!("{}: {e}", self.bin.display()))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(parse_cli_error(&stderr, operation).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn call_json<T: for<'de> Deserialize<'de>>(
        &self,
        service: &str,
        operation: &str,
        args: &[&str],
    ) -> Result<T> {
        let stdout = self.call(service, operation, args)?;
        Ok(serde_json::from_str(&stdout)?)
    }

    fn stack_call(&self, operation: &str, request: &StackRequest) -> Result<String> {
        let parameters = serde_json::to_string(&request.parameters)?;
        self.call(
            "cloudformation",
            operation,
            &[
                "--stack-name",
                &request.name,
                "--template-body",
                &request.template_body,
                "--parameters",
                &parameters,
                "--capabilities",
                "CAPABILITY_IAM",
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBuckets {
    #[serde(default)]
    buckets: Vec<BucketEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketEntry {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacks {
    #[serde(default)]
    stacks: Vec<StackEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackEntry {
    stack_name: String,
    stack_status: String,
    #[serde(default)]
    outputs: Vec<OutputEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OutputEntry {
    output_key: String,
    output_value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvokeResponse {
    #[serde(default)]
    function_error: Option<String>,
    #[serde(default)]
    log_result: Option<String>,
}

fn parse_describe_stacks(stdout: &str, name: &str) -> Result<StackProbe> {
    let parsed: DescribeStacks = serde_json::from_str(stdout)?;
    let Some(stack) = parsed.stacks.into_iter().next() else {
        return Ok(StackProbe::Absent);
    };
    tracing::trace!(requested = name, found = %stack.stack_name, "describe-stacks");
    Ok(StackProbe::Present(StackDescription {
        name: stack.stack_name,
        status: StackStatus::new(stack.stack_status),
        outputs: stack
            .outputs
            .into_iter()
            .map(|o| StackOutput {
                key: o.output_key,
                value: o.output_value,
            })
            .collect(),
    }))
}

static CLI_ERROR_RE: OnceLock<Regex> = OnceLock::new();

fn cli_error_re() -> &'static Regex {
    CLI_ERROR_RE.get_or_init(|| {
        Regex::new(
            r"An error occurred \((?P<code>[^)]+)\) when calling the (?P<op>\w+) operation(?: \([^)]*\))?: (?P<msg>.*)",
        )
        .unwrap()
    })
}

/// Classify the client's stderr. Anything that does not follow the service
/// error format is surfaced verbatim under the `Unclassified` code.
pub fn parse_cli_error(stderr: &str, operation: &str) -> ProviderError {
    match cli_error_re().captures(stderr) {
        Some(caps) => ProviderError::new(&caps["code"], &caps["op"], caps["msg"].trim()),
        None => ProviderError::new("Unclassified", operation, stderr.trim()),
    }
}

// ---------------------------------------------------------------------------
// CloudProvider
// ---------------------------------------------------------------------------

impl CloudProvider for AwsCli {
    fn account_id(&self) -> Result<String> {
        let identity: CallerIdentity = self.call_json("sts", "get-caller-identity", &[])?;
        Ok(identity.account)
    }

    fn put_object(&self, bucket: &str, key: &str, body: &Path) -> Result<()> {
        let body = body.to_string_lossy();
        self.call(
            "s3api",
            "put-object",
            &["--bucket", bucket, "--key", key, "--body", &body],
        )?;
        Ok(())
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let listing: ListBuckets = self.call_json("s3api", "list-buckets", &[])?;
        Ok(listing.buckets.iter().any(|b| b.name == bucket))
    }

    fn create_bucket(&self, bucket: &str) -> Result<()> {
        // us-east-1 rejects an explicit location constraint.
        if self.session.region == "us-east-1" {
            self.call("s3api", "create-bucket", &["--bucket", bucket])?;
        } else {
            let location = format!("LocationConstraint={}", self.session.region);
            self.call(
                "s3api",
                "create-bucket",
                &[
                    "--bucket",
                    bucket,
                    "--create-bucket-configuration",
                    &location,
                ],
            )?;
        }
        Ok(())
    }

    fn role_exists(&self, role: &str) -> Result<bool> {
        match self.call("iam", "get-role", &["--role-name", role]) {
            Ok(_) => Ok(true),
            Err(RdkError::Provider(e)) if e.code == "NoSuchEntity" => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn create_role(&self, role: &str, assume_role_policy: &str) -> Result<()> {
        self.call(
            "iam",
            "create-role",
            &[
                "--role-name",
                role,
                "--assume-role-policy-document",
                assume_role_policy,
            ],
        )?;
        Ok(())
    }

    fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()> {
        self.call(
            "iam",
            "attach-role-policy",
            &["--role-name", role, "--policy-arn", policy_arn],
        )?;
        Ok(())
    }

    fn put_role_policy(&self, role: &str, policy_name: &str, document: &str) -> Result<()> {
        self.call(
            "iam",
            "put-role-policy",
            &[
                "--role-name",
                role,
                "--policy-name",
                policy_name,
                "--policy-document",
                document,
            ],
        )?;
        Ok(())
    }

    fn put_configuration_recorder(&self, name: &str, role_arn: &str) -> Result<()> {
        let recorder = serde_json::json!({ "name": name, "roleARN": role_arn }).to_string();
        let group = serde_json::json!({
            "allSupported": true,
            "includeGlobalResourceTypes": true,
        })
        .to_string();
        self.call(
            "configservice",
            "put-configuration-recorder",
            &[
                "--configuration-recorder",
                &recorder,
                "--recording-group",
                &group,
            ],
        )?;
        Ok(())
    }

    fn put_delivery_channel(&self, name: &str, bucket: &str, frequency: Frequency) -> Result<()> {
        let channel = serde_json::json!({
            "name": name,
            "s3BucketName": bucket,
            "configSnapshotDeliveryProperties": { "deliveryFrequency": frequency.as_str() },
        })
        .to_string();
        self.call(
            "configservice",
            "put-delivery-channel",
            &["--delivery-channel", &channel],
        )?;
        Ok(())
    }

    fn start_configuration_recorder(&self, name: &str) -> Result<()> {
        self.call(
            "configservice",
            "start-configuration-recorder",
            &["--configuration-recorder-name", name],
        )?;
        Ok(())
    }

    fn describe_stack(&self, name: &str) -> Result<StackProbe> {
        match self.call("cloudformation", "describe-stacks", &["--stack-name", name]) {
            Ok(stdout) => parse_describe_stacks(&stdout, name),
            Err(RdkError::Provider(e)) if e.is_stack_missing() => Ok(StackProbe::Absent),
            Err(e) => Err(e),
        }
    }

    fn create_stack(&self, request: &StackRequest) -> Result<()> {
        self.stack_call("create-stack", request)?;
        Ok(())
    }

    fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome> {
        match self.stack_call("update-stack", request) {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(RdkError::Provider(e)) if e.is_no_updates() => Ok(UpdateOutcome::NoUpdates),
            Err(e) => Err(e),
        }
    }

    fn update_function_code(
        &self,
        function: &str,
        bucket: &str,
        key: &str,
        publish: bool,
    ) -> Result<()> {
        let publish_flag = if publish { "--publish" } else { "--no-publish" };
        self.call(
            "lambda",
            "update-function-code",
            &[
                "--function-name",
                function,
                "--s3-bucket",
                bucket,
                "--s3-key",
                key,
                publish_flag,
            ],
        )?;
        Ok(())
    }

    fn invoke(&self, function: &str, payload: &str) -> Result<Invocation> {
        let out = tempfile::NamedTempFile::new()?;
        let out_path = out.path().to_string_lossy().into_owned();
        let response: InvokeResponse = self.call_json(
            "lambda",
            "invoke",
            &[
                "--function-name",
                function,
                "--invocation-type",
                "RequestResponse",
                "--log-type",
                "Tail",
                "--cli-binary-format",
                "raw-in-base64-out",
                "--payload",
                payload,
                &out_path,
            ],
        )?;
        let payload = std::fs::read_to_string(out.path())?;
        Ok(Invocation {
            function_error: response.function_error,
            payload,
            log_result: response.log_result,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
