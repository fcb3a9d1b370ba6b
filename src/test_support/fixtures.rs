//! Test fixtures for common test scenarios.
//!
//! [`FunctionsFixture`] lays out a small Firebase project on disk: a
//! functions codebase with two HTTP functions, one of which pulls in a
//! payments module and its `stripe` dependency.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::core::staging::StagingRoot;
use crate::core::FunctionsProject;
use crate::util::config::Config;

pub const FIREBASE_JSON: &str = r#"{
  "functions": {
    "source": "functions",
    "predeploy": ["npm --prefix \"$RESOURCE_DIR\" run build"]
  },
  "hosting": {
    "public": "public"
  }
}
"#;

pub const FIREBASERC: &str = r#"{
  "projects": {
    "default": "demo"
  }
}
"#;

pub const PACKAGE_JSON: &str = r#"{
  "name": "functions",
  "main": "lib/index.js",
  "scripts": {
    "build": "tsc"
  },
  "engines": {
    "node": "18"
  },
  "dependencies": {
    "firebase-admin": "^11.8.0",
    "firebase-functions": "^4.3.1",
    "stripe": "^12.0.0"
  },
  "devDependencies": {
    "typescript": "^5.0.0"
  },
  "private": true
}
"#;

pub const INDEX_TS: &str = r#"import * as functions from "firebase-functions";
import * as admin from "firebase-admin";
import { sendMail } from "./mail";
import { charge } from "./payments";

admin.initializeApp();

export const sendEmail = functions.https.onRequest(async (req, res) => {
  await sendMail(String(req.query.to));
  res.send("ok");
});

export const processPayment = functions.https.onCall(async (data) => {
  return charge(data.amount);
});
"#;

pub const MAIL_TS: &str = r#"export async function sendMail(to: string): Promise<void> {
  console.log(`mail to ${to}`);
}
"#;

pub const PAYMENTS_TS: &str = r#"import Stripe from "stripe";

const stripe = new Stripe(process.env.STRIPE_KEY ?? "");

export async function charge(amount: number) {
  return stripe.charges.create({ amount, currency: "usd" });
}
"#;

pub const INDEX_JS: &str = r#""use strict";
Object.defineProperty(exports, "__esModule", { value: true });
exports.processPayment = exports.sendEmail = void 0;
const functions = require("firebase-functions");
const admin = require("firebase-admin");
const mail_1 = require("./mail");
const payments_1 = require("./payments");
admin.initializeApp();
exports.sendEmail = functions.https.onRequest(async (req, res) => {
    await (0, mail_1.sendMail)(String(req.query.to));
    res.send("ok");
});
exports.processPayment = functions.https.onCall(async (data) => {
    return (0, payments_1.charge)(data.amount);
});
"#;

/// A Firebase project in a temporary directory.
pub struct FunctionsFixture {
    dir: TempDir,
}

impl FunctionsFixture {
    /// An empty project directory.
    pub fn empty() -> Self {
        FunctionsFixture {
            dir: TempDir::new().unwrap(),
        }
    }

    /// The two-function project described in the module docs.
    pub fn standard() -> Self {
        Self::empty()
            .with_file("firebase.json", FIREBASE_JSON)
            .with_file(".firebaserc", FIREBASERC)
            .with_file("functions/package.json", PACKAGE_JSON)
            .with_file("functions/src/index.ts", INDEX_TS)
            .with_file("functions/src/mail.ts", MAIL_TS)
            .with_file("functions/src/payments.ts", PAYMENTS_TS)
            .with_file("functions/lib/index.js", INDEX_JS)
    }

    /// Add or replace a file, relative to the project root.
    pub fn with_file(self, rel: &str, contents: &str) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Open the fixture as a project with the active `.firebaserc` project.
    pub fn open(&self, config: &Config) -> FunctionsProject {
        FunctionsProject::open(self.root(), config, None).unwrap()
    }

    /// Whether neither staging location exists.
    pub fn staging_is_clean(&self) -> bool {
        let (staging, relocated) =
            StagingRoot::locations(self.root(), &self.root().join("functions"));
        !staging.exists() && !relocated.exists()
    }

    /// Plant a dangling symlink so copying the functions directory fails.
    #[cfg(unix)]
    pub fn break_materialization(&self) {
        std::os::unix::fs::symlink(
            self.root().join("missing-target"),
            self.root().join("functions/dangling.ts"),
        )
        .unwrap();
    }
}
