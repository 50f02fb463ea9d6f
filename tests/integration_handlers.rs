//! 算法处理器集成测试
//!
//! 使用公开参考实现生成的已知向量，经由 Context 验证每个内置算法。

use passrs::handler::{self, CiscoHandler, Md5CryptHandler, Pbkdf2Handler};
use passrs::{BoundsMode, ContextConfig, Error, Handler, HashOptions, VerifyOptions};

/// (算法, 密码, 哈希)
const VECTORS: &[(&str, &str, &str)] = &[
    ("md5_crypt", "test", "$1$test$pi/xDtU5WFVRqYS6BMU8X/"),
    ("md5_crypt", "password", "$1$saltsalt$qjXMvbEw8oaL.CzflDtaK/"),
    (
        "pbkdf2_sha1",
        "password",
        "$pbkdf2$1$c2FsdA$DGDID5YfDnHzqbUkr2ASBi/gN6Y",
    ),
    (
        "pbkdf2_sha256",
        "password",
        "$pbkdf2-sha256$1000$c2FsdA$YywoEuRtRgQQK6dhjp1tfS.BKPYma0oDJk0qBGC33LM",
    ),
    (
        "pbkdf2_sha512",
        "password",
        "$pbkdf2-sha512$1000$c2FsdA$r.bFUweFtsxrHGRTOEcxvV7kMu5Un9QvtmlXea2KHFv1neacSPd078QAfVKY.QM8AkHVq2kwXntk7O642DTP7A",
    ),
    (
        "django_salted_sha1",
        "password",
        "sha1$abcde$f513c4466c7991d917d0cc026829387f6cbf9f94",
    ),
    (
        "django_salted_md5",
        "password",
        "md5$abcde$871108235bfefede288620664f44ada8",
    ),
    (
        "oracle11",
        "SHAUGHNESSY",
        "S:33AEC159CC5C1994D46C1483D8DB0DAA23BB338B8C2C8E4B8E62E3946E0A",
    ),
    ("cisco_pix", "cisco", "2KFQnbNIdI.2KYOU"),
    ("phpass", "test12345", "$P$9IQRaTwmfeRo7ud9Fh4E2PdI0S3r.L0"),
    ("phpass", "test12345", "$H$9IQRaTwmfeRo7ud9Fh4E2PdI0S3r.L0"),
    ("phpass", "", "$P$7JaFQsPzJSuenezefD/3jHgt5hVfNH0"),
    ("nthash", "passphrase", "$3$$7f8fe03093cc84b267b109625f6bbf4b"),
    ("nthash", "passphrase", "$NT$7f8fe03093cc84b267b109625f6bbf4b"),
];

/// 所有已知向量都能被识别并验证，且解码后重新编码得到原字符串
#[test]
fn test_known_vectors_through_context() {
    let context = ContextConfig::new(handler::builtin_schemes())
        .build()
        .unwrap();
    for (scheme, password, hash) in VECTORS {
        assert_eq!(context.identify(hash), Some(*scheme), "{}", hash);
        assert!(context.verify(password, hash).unwrap(), "{}", hash);
        assert!(!context.verify("not-the-password", hash).unwrap(), "{}", hash);

        let record = context.decode(hash).unwrap();
        assert_eq!(record.scheme, *scheme);
        assert_eq!(context.encode(&record).unwrap(), *hash);
    }
}

/// 每个内置算法都能完成哈希与验证的往返
#[test]
fn test_every_builtin_round_trips() {
    let mut config = ContextConfig::new(handler::builtin_schemes());
    for scheme in ["pbkdf2_sha1", "pbkdf2_sha256", "pbkdf2_sha512"] {
        config = config.with_override(
            scheme,
            passrs::SchemeOverride::new().with_default_rounds(100),
        );
    }
    config = config.with_override(
        "phpass",
        passrs::SchemeOverride::new().with_default_rounds(8),
    );
    #[cfg(feature = "bcrypt")]
    {
        config = config.with_override(
            "bcrypt",
            passrs::SchemeOverride::new().with_default_rounds(4),
        );
    }
    #[cfg(feature = "argon2")]
    {
        config = config.with_override(
            "argon2",
            passrs::SchemeOverride::new()
                .with_default_rounds(1)
                .with_memory_cost(64)
                .with_parallelism(1),
        );
    }
    let context = config.build().unwrap();

    for scheme in context.schemes() {
        let options = HashOptions::new().with_scheme(scheme);
        let hash = context.hash_with("s3cret", &options).unwrap();
        // PIX 与 ASA 共用格式，识别结果总是先注册的 cisco_pix
        if scheme != "cisco_asa" {
            assert_eq!(context.identify(&hash), Some(scheme), "{}", hash);
        }
        if scheme == "django_disabled" {
            assert_eq!(hash, "!");
            assert!(!context.verify("s3cret", &hash).unwrap());
        } else {
            assert!(context.verify("s3cret", &hash).unwrap(), "{}", hash);
            assert!(!context.verify("s3cret!", &hash).unwrap(), "{}", hash);
        }
    }
}

/// apr1 与 md5-crypt 共享算法但 marker 不同
#[test]
fn test_apr_md5_crypt() {
    let handler = Md5CryptHandler::apr();
    let hash = handler
        .hash(
            b"password",
            &HashOptions::new().with_salt("saltsalt"),
            handler.config(),
            BoundsMode::Strict,
        )
        .unwrap();
    assert!(hash.starts_with("$apr1$saltsalt$"));
    assert_ne!(&hash[15..], "qjXMvbEw8oaL.CzflDtaK/");
    assert!(
        handler
            .verify(b"password", &hash, &VerifyOptions::default())
            .unwrap()
    );
}

/// Cisco 哈希通过用户名加盐，验证时需要提供相同的用户名
#[test]
fn test_cisco_user_context() {
    let context = ContextConfig::new(["cisco_asa", "cisco_pix"]).build().unwrap();
    let with_user = VerifyOptions::with_user("hsmith");

    assert!(
        context
            .verify_with("hsmith", "ucZIZzozW9FqpS5w", &with_user)
            .unwrap()
    );
    assert!(!context.verify("hsmith", "ucZIZzozW9FqpS5w").unwrap());

    let hash = context
        .hash_with("password", &HashOptions::new().with_user("admin"))
        .unwrap();
    assert_eq!(hash, "7KKG/zg/Wo8c.YfN");
}

/// 默认 Context 只启用 PIX；ASA 哈希需要显式启用 cisco_asa 才能验证
#[test]
fn test_cisco_asa_requires_explicit_context() {
    let asa_hash = "IneB.wc9sfRzLPoh";
    let password = "0123456789abcdef";
    let with_user = VerifyOptions::with_user("user");

    let default = passrs::default_context().unwrap();
    assert!(!default.schemes().contains(&"cisco_asa"));
    assert_eq!(default.identify(asa_hash), Some("cisco_pix"));

    let asa = ContextConfig::new(["cisco_asa"]).build().unwrap();
    assert!(asa.verify_with(password, asa_hash, &with_user).unwrap());

    // 两者都启用时，先注册的 cisco_asa 认领该格式
    let both = ContextConfig::new(["cisco_asa", "cisco_pix"]).build().unwrap();
    assert_eq!(both.identify(asa_hash), Some("cisco_asa"));
    assert!(both.verify_with(password, asa_hash, &with_user).unwrap());
}

/// Cisco 密码长度限制：哈希时报错，验证时静默失败
#[test]
fn test_cisco_password_size() {
    let pix = CiscoHandler::pix();
    let long = "a".repeat(17);
    let err = pix
        .hash(
            long.as_bytes(),
            &HashOptions::new(),
            pix.config(),
            BoundsMode::Strict,
        )
        .unwrap_err();
    assert!(matches!(err, Error::PasswordSize { max: 16, .. }));
    assert!(
        !pix.verify(long.as_bytes(), "2KFQnbNIdI.2KYOU", &VerifyOptions::default())
            .unwrap()
    );
}

/// PBKDF2 的三个变体 marker 互不混淆
#[test]
fn test_pbkdf2_variants_distinct() {
    let sha1 = Pbkdf2Handler::sha1();
    let sha256 = Pbkdf2Handler::sha256();
    let sha512 = Pbkdf2Handler::sha512();
    let hash = "$pbkdf2-sha512$1000$c2FsdA$r.bFUweFtsxrHGRTOEcxvV7kMu5Un9QvtmlXea2KHFv1neacSPd078QAfVKY.QM8AkHVq2kwXntk7O642DTP7A";
    assert!(!sha1.identify(hash));
    assert!(!sha256.identify(hash));
    assert!(sha512.identify(hash));
}

/// bcrypt 的已知向量与规范化
#[cfg(feature = "bcrypt")]
#[test]
fn test_bcrypt_vectors() {
    let context = ContextConfig::new(["bcrypt"]).build().unwrap();
    for hash in [
        "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
        "$2b$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW",
    ] {
        assert!(context.verify("U*U", hash).unwrap());
        assert!(!context.verify("U*V", hash).unwrap());
    }
    // 2a 不是默认变体，需要升级
    assert!(
        context
            .needs_update("$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW")
            .unwrap()
    );
}

/// argon2 的已知向量
#[cfg(feature = "argon2")]
#[test]
fn test_argon2_vector() {
    let context = ContextConfig::new(["argon2"]).build().unwrap();
    let hash = "$argon2id$v=19$m=256,t=2,p=1$c29tZXNhbHQxMjM0NTY3OA$gRDhFl6w4RFO431f8BdXO6AIS4NmtBCNtEdJlUuNmHE";
    assert!(context.verify("password", hash).unwrap());
    assert!(!context.verify("password1", hash).unwrap());
    // 内存成本低于默认配置，需要升级
    assert!(context.needs_update(hash).unwrap());
}
