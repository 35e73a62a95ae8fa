//! Calldata for direct transfers to the dead address.
//!
//! Every burn is a plain transfer called by the holder, so no approval
//! or intermediate contract is ever involved.

use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

pub const ERC20_TRANSFER: &str = "transfer(address,uint256)";
pub const ERC721_TRANSFER_FROM: &str = "transferFrom(address,address,uint256)";
pub const ERC721_SAFE_TRANSFER_FROM: &str = "safeTransferFrom(address,address,uint256)";
pub const ERC1155_SAFE_TRANSFER_FROM: &str = "safeTransferFrom(address,address,uint256,uint256,bytes)";

fn with_selector(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    Bytes::from(data)
}

pub fn erc20_transfer(to: Address, amount: U256) -> Bytes {
    with_selector(ERC20_TRANSFER, &[Token::Address(to), Token::Uint(amount)])
}

pub fn erc721_transfer(from: Address, to: Address, token_id: U256, safe: bool) -> Bytes {
    let signature = if safe {
        ERC721_SAFE_TRANSFER_FROM
    } else {
        ERC721_TRANSFER_FROM
    };
    with_selector(
        signature,
        &[Token::Address(from), Token::Address(to), Token::Uint(token_id)],
    )
}

pub fn erc1155_transfer(from: Address, to: Address, id: U256, amount: U256) -> Bytes {
    with_selector(
        ERC1155_SAFE_TRANSFER_FROM,
        &[
            Token::Address(from),
            Token::Address(to),
            Token::Uint(id),
            Token::Uint(amount),
            Token::Bytes(Vec::new()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dead() -> Address {
        "0x000000000000000000000000000000000000dEaD".parse().unwrap()
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(&erc20_transfer(dead(), U256::one())[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        let owner = Address::from_low_u64_be(1);
        assert_eq!(
            &erc721_transfer(owner, dead(), U256::one(), true)[..4],
            &[0x42, 0x84, 0x2e, 0x0e]
        );
        assert_eq!(
            &erc721_transfer(owner, dead(), U256::one(), false)[..4],
            &[0x23, 0xb8, 0x72, 0xdd]
        );
        assert_eq!(
            &erc1155_transfer(owner, dead(), U256::one(), U256::one())[..4],
            &[0xf2, 0x42, 0x43, 0x2a]
        );
    }

    #[test]
    fn test_erc20_layout() {
        let data = erc20_transfer(dead(), U256::from(1000));
        assert_eq!(data.len(), 4 + 32 * 2);
        // Address is right-aligned in the first word.
        assert_eq!(&data[4 + 12..4 + 32], dead().as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1000));
    }

    #[test]
    fn test_erc1155_has_empty_bytes_tail() {
        let data = erc1155_transfer(Address::from_low_u64_be(1), dead(), U256::from(5), U256::from(2));
        // 5 head words + 1 length word for the empty `bytes`.
        assert_eq!(data.len(), 4 + 32 * 6);
        assert_eq!(U256::from_big_endian(&data[4 + 32 * 4..4 + 32 * 5]), U256::from(160));
        assert_eq!(U256::from_big_endian(&data[4 + 32 * 5..]), U256::zero());
    }
}
