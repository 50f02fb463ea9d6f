//! 凭据迁移示例
//!
//! 展示如何用 passrs 同时验证新旧格式的密码哈希，并在登录时逐步迁移到新算法。
//!
//! 运行: cargo run --example migration

use passrs::{Context, ContextConfig, HashOptions, VerifyOptions};
use std::collections::HashMap;

/// 迁移策略（实际应用中通常放在配置文件里）
const POLICY: &str = r#"
schemes = ["pbkdf2_sha256", "md5_crypt", "django_salted_sha1", "cisco_pix"]
default = "pbkdf2_sha256"
deprecated = ["md5_crypt", "django_salted_sha1", "cisco_pix"]

[overrides.pbkdf2_sha256]
min_rounds = 29000
"#;

/// 简单的凭据存储（实际应用中应使用数据库）
struct CredentialStore {
    hashes: HashMap<String, String>,
}

impl CredentialStore {
    fn new() -> Self {
        Self {
            hashes: HashMap::new(),
        }
    }

    fn import(&mut self, username: &str, hash: &str) {
        self.hashes.insert(username.to_string(), hash.to_string());
    }
}

/// 认证服务
struct AuthService {
    context: Context,
    store: CredentialStore,
}

impl AuthService {
    fn new(context: Context) -> Self {
        Self {
            context,
            store: CredentialStore::new(),
        }
    }

    /// 用户注册：总是使用默认算法
    fn register(&mut self, username: &str, password: &str) -> Result<(), String> {
        let hash = self
            .context
            .hash_with(password, &HashOptions::new().with_user(username))
            .map_err(|e| format!("密码哈希失败: {}", e))?;
        println!("✅ 用户注册成功: {} -> {}", username, hash);
        self.store.import(username, &hash);
        Ok(())
    }

    /// 用户登录：验证成功且哈希过时时写回新哈希
    fn login(&mut self, username: &str, password: &str) -> Result<(), String> {
        // 1. 查找用户，不存在时仍然消耗一次验证时间
        let Some(stored) = self.store.hashes.get(username) else {
            let _ = self.context.dummy_verify(password);
            return Err("用户名或密码错误".to_string());
        };

        // 2. 验证并检查是否需要升级
        let scheme = self.context.identify(stored).unwrap_or("unknown");
        let (valid, updated) = self
            .context
            .verify_and_update_with(password, stored, &VerifyOptions::with_user(username))
            .map_err(|e| format!("密码验证失败: {}", e))?;
        if !valid {
            return Err("用户名或密码错误".to_string());
        }

        // 3. 写回新哈希
        match updated {
            Some(hash) => {
                println!("✅ 登录成功: {} ({} -> pbkdf2_sha256)", username, scheme);
                println!("   新哈希: {}", hash);
                self.store.import(username, &hash);
            }
            None => println!("✅ 登录成功: {} ({}，无需升级)", username, scheme),
        }
        Ok(())
    }
}

fn main() {
    println!("=== passrs 凭据迁移示例 ===\n");

    let context = match ContextConfig::from_toml_str(POLICY).and_then(ContextConfig::build) {
        Ok(context) => context,
        Err(e) => {
            println!("❌ 配置无效: {}", e);
            return;
        }
    };
    let mut auth = AuthService::new(context);

    // 1. 导入旧系统的哈希
    println!("📦 导入旧系统凭据...");
    auth.store.import("alice", "$1$saltsalt$qjXMvbEw8oaL.CzflDtaK/");
    auth.store
        .import("bob", "sha1$abcde$f513c4466c7991d917d0cc026829387f6cbf9f94");
    auth.store.import("hsmith", "ucZIZzozW9FqpS5w");
    println!("   已导入 {} 条\n", auth.store.hashes.len());

    // 2. 注册新用户
    println!("📝 注册新用户...");
    if let Err(e) = auth.register("carol", "CarolSecure#2024!") {
        println!("   ❌ {}", e);
    }
    println!();

    // 3. 错误密码
    println!("🔐 尝试错误密码登录...");
    for user in ["alice", "bob", "nobody"] {
        if let Err(e) = auth.login(user, "wrong_password") {
            println!("   {}: {}", user, e);
        }
    }
    println!();

    // 4. 第一次正确登录触发迁移
    println!("🔐 第一次登录...");
    for (user, password) in [
        ("alice", "password"),
        ("bob", "password"),
        ("hsmith", "hsmith"),
        ("carol", "CarolSecure#2024!"),
    ] {
        if let Err(e) = auth.login(user, password) {
            println!("   ❌ {}: {}", user, e);
        }
    }
    println!();

    // 5. 再次登录不再升级
    println!("🔐 再次登录...");
    for (user, password) in [("alice", "password"), ("hsmith", "hsmith")] {
        if let Err(e) = auth.login(user, password) {
            println!("   ❌ {}: {}", user, e);
        }
    }

    println!("\n=== 示例结束 ===");
}
