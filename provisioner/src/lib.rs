//! Provision a load-balanced, auto-scaling web tier on AWS.
//!
//! # Status
//!
//! `provisioner` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.
//!
//! # Resources
//!
//! A single `create` call provisions, in order:
//!
//! 1. A security group in the configured VPC (HTTP and HTTPS open to the world by default)
//! 2. An internet-facing application load balancer across the configured subnets
//! 3. A target group with an HTTP health check
//! 4. A listener forwarding load balancer traffic to the target group
//! 5. A launch template for the configured AMI and instance type
//! 6. An auto-scaling group spanning the configured subnets
//! 7. A target-tracking scaling policy on average CPU utilization
//! 8. An SNS topic for scaling events
//! 9. An SNS subscription delivering those events to the configured endpoint
//!
//! Each step consumes identifiers produced by earlier steps. A failed step aborts the sequence and
//! leaves whatever was already created in place; `destroy` removes it.
//!
//! # Persistence
//!
//! Every deployment is tracked under `$HOME/.provisioner/<tag>`. The identifier of each resource is
//! written to `resources.yaml` as soon as the resource exists, so `destroy --tag <tag>` works even
//! after a partial `create`.
//!
//! # Example Configuration
//!
//! ```yaml
//! tag: app
//! region: us-east-1
//! vpc_id: vpc-0f22c13329dc40837
//! subnets:
//!   - subnet-0dc085f68a4254e66
//!   - subnet-05c5c244dc8e4409a
//! instance:
//!   image_id: ami-01312848387ace2b4
//!   instance_type: t2.micro
//! notifications:
//!   endpoint: ops@example.com
//! auto_scaling:
//!   min_size: 1
//!   max_size: 5
//!   desired_capacity: 1
//! ```

cfg_if::cfg_if! {
    if #[cfg(feature = "aws")] {
        pub mod aws;
    }
}
