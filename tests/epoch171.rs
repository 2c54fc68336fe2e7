//! Epoch 171 (block 1,282,500): a non-zero epoch exercising seed iteration
//! and cache growth, with vectors recorded from an independent
//! implementation of the same algorithms.

use once_cell::sync::Lazy;

use emberhash::{
    epoch_from_block, epoch_from_seed, epoch_seed, ethash, period_from_block, progpow,
    EpochContext, Hash256, VerificationResult,
};

const BLOCK: u64 = 1_282_500;

static CONTEXT: Lazy<EpochContext> =
    Lazy::new(|| EpochContext::new(171, false).expect("epoch 171 light context"));

fn header() -> Hash256 {
    Hash256::from_hex("f5f1b4bbbe6a1bff0b13c35c9ff76d1e7c27c1de9ac5e21414cf5ca671a80a3d")
        .unwrap()
}

const NONCE: u64 = 0x495732aa74c937f6;

#[test]
fn epoch_derivation() {
    assert_eq!(epoch_from_block(BLOCK), 171);
    let seed = epoch_seed(171);
    assert_eq!(
        seed.to_hex(),
        "a9b0e0c9aca72c07ba06b5bbdae8b8f69e61878301508473379bb4f71807d707"
    );
    assert_eq!(epoch_from_seed(&seed).unwrap(), 171);
}

#[test]
fn grown_cache_parameters() {
    assert_eq!(CONTEXT.light_cache_num_items(), 612_349);
    assert_eq!(CONTEXT.full_dataset_num_items(), 19_595_249);
    assert_eq!(
        CONTEXT.light_cache()[0].to_hex(),
        "bb7f72d3813a9a9ad14e6396a3be9edba40197f8c6b60a26ca188260227f5d28\
         7616e9c93da7de35fd237c191c36cdcc00abd98dfcacd11d1f2544aa52000917"
    );
    assert_eq!(
        CONTEXT.light_cache().last().unwrap().to_hex(),
        "ec45073bd7820fe58ea29fa89375050cfb1da7bdb17b79f20f8e427bef1cdc09\
         76d1291597fece7f538e5281a9d8df3f0b842bb691ade89d3864dfa965c7e187"
    );
}

#[test]
fn ethash_block_1282500() {
    let result = ethash::hash(&CONTEXT, &header(), NONCE);
    assert_eq!(
        result.final_hash.to_hex(),
        "529c3bcf4be6b953e57ebd07709add6f2ba2ff6f0fab3a290f243aa6dfb4ba05"
    );
    assert_eq!(
        result.mix_hash.to_hex(),
        "f6848403542279b0f6a12d844c08e660edc85d52d78b15171ad6c82db3760cb8"
    );
    assert_eq!(
        ethash::verify_full(&CONTEXT, &header(), &result.mix_hash, NONCE, &result.final_hash),
        VerificationResult::Ok
    );
}

#[test]
fn progpow_block_1282500() {
    let period = period_from_block(BLOCK);
    let result = progpow::hash(&CONTEXT, period, &header(), NONCE);
    assert_eq!(
        result.final_hash.to_hex(),
        "181ca1f244bd3a203a6e032922732b804b7b041ac374d49b204eb5a204498970"
    );
    assert_eq!(
        result.mix_hash.to_hex(),
        "ef3fae06f41b1cc8936c406d1bb34d78e00d82d217cfb0aa72c2d36c4f0fe46e"
    );
    assert_eq!(
        progpow::verify_full(
            &CONTEXT,
            period,
            &header(),
            &result.mix_hash,
            NONCE,
            &result.final_hash
        ),
        VerificationResult::Ok
    );
}
