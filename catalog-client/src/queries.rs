//! GraphQL document builders
//!
//! The catalog API takes full documents rather than persisted queries. Page
//! and identifier arguments are interpolated into the document the same way
//! the API's own examples do; identifiers are GUIDs and are sanitized before
//! interpolation.

/// Lightweight query fetching only listing ids and change timestamps.
pub fn ids_page_query(page: u32, size: u32) -> String {
    format!(
        "query ListingIds {{
            search {{
                listings(metadata: {{ page: {page}, size: {size} }}) {{
                    listings {{
                        id
                        details {{
                            publication {{
                                changedTimestamp
                                createdTimestamp
                            }}
                        }}
                    }}
                    metadata {{
                        currentPage
                        totalItems
                        totalPages
                        pageSize
                    }}
                }}
            }}
        }}"
    )
}

/// Query fetching the full detail of a single listing by GUID.
pub fn single_listing_query(external_id: &str) -> String {
    let guid = sanitize_guid(external_id);
    format!(
        "query SingleListing {{
            listing(guid: \"{guid}\") {{
                id
                details {{
                    description
                    vehicle {{
                        bodyType {{ raw formatted }}
                        legalCategories {{ raw formatted }}
                        classification {{
                            make {{ raw formatted }}
                            model {{ raw formatted }}
                            modelYear
                        }}
                        condition {{
                            mileageInKm {{ raw formatted }}
                            firstRegistrationDate {{ raw formatted }}
                        }}
                        engine {{
                            power {{
                                hp {{ raw formatted }}
                                kw {{ raw formatted }}
                            }}
                            engineDisplacementInCCM {{ raw formatted }}
                            transmissionType {{ raw formatted }}
                        }}
                        fuels {{
                            fuelCategory {{ raw formatted }}
                            primary {{
                                consumption {{
                                    combined {{ raw formatted }}
                                }}
                            }}
                        }}
                        identifier {{
                            vin
                            licensePlate
                        }}
                    }}
                    prices {{
                        public {{
                            amountInEUR {{ raw formatted }}
                            netAmountInEUR {{ raw formatted }}
                            vatRate
                        }}
                    }}
                    media {{
                        images {{
                            ... on StandardImage {{
                                formats {{
                                    webp {{
                                        size640x480
                                        size800x600
                                        size1280x960
                                    }}
                                    jpg {{
                                        size640x480
                                        size800x600
                                        size1280x960
                                    }}
                                }}
                            }}
                        }}
                    }}
                    location {{
                        countryCode
                        zip
                        city
                        street
                    }}
                    adProduct {{
                        title
                    }}
                    publication {{
                        changedTimestamp
                        createdTimestamp
                    }}
                }}
            }}
        }}"
    )
}

/// Minimal query returning only the catalog total, used both for Phase 2
/// counting and as the functional-query probe during validation.
pub fn total_count_query() -> String {
    "query TotalListings {
        listings {
            metadata {
                totalItems
                totalPages
                pageSize
                currentPage
            }
        }
    }"
    .to_string()
}

/// Strip anything that is not part of a GUID before document interpolation.
fn sanitize_guid(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}
