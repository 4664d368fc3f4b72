//! IAM policy documents attached to every deployment.

/// Trust policy letting EC2 assume the project role.
pub const TRUST_POLICY: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [
    {
      "Sid": "",
      "Effect": "Allow",
      "Principal": {
        "Service": "ec2.amazonaws.com"
      },
      "Action": "sts:AssumeRole"
    }
  ]
}"#;

/// Permission policy granting get/list/put on the project's own bucket.
#[must_use]
pub fn permission_policy(bucket: &str) -> String {
    let document = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Action": ["s3:Get*", "s3:List*", "s3:Put*"],
                "Effect": "Allow",
                "Resource": format!("arn:aws:s3:::{bucket}/*"),
            }
        ]
    });
    serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
}
